//! Detailed-placement site grid.
//!
//! Every placement row is cut into segments at fixed cells. A movable cell
//! occupies a run of sites inside one segment; site occupancy and segment
//! membership change only through the journaled primitives below.

use crate::journal::{Journal, JournalAction, Slot};
use drt_common::db::design::{Design, Row};
use drt_common::db::indices::{CellId, NetId, PinId};
use drt_common::error::{DrtError, DrtResult, ErrorKind};
use drt_common::geom::{Dbu, Point, Rect};
use drt_common::util::logger::Tool;
use drt_common::{report_error, report_info, report_warn};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    pub row: u32,
    pub start: u32,
    /// Exclusive.
    pub end: u32,
    /// Member cells keyed by leftmost site.
    cells: BTreeMap<u32, CellId>,
}

impl Segment {
    pub fn cells(&self) -> impl Iterator<Item = (u32, CellId)> + '_ {
        self.cells.iter().map(|(&s, &c)| (s, c))
    }

    pub fn num_sites(&self) -> u32 {
        self.end - self.start
    }
}

#[derive(Clone, Debug)]
struct Node {
    width: u32,
    height: Dbu,
    movable: bool,
    slot: Option<Slot>,
    segment: Option<usize>,
    pos: Point,
}

#[derive(Clone, Copy, Debug)]
enum PinAnchor {
    Cell(CellId, Point),
    Fixed(Point),
}

fn illegal(msg: String) -> DrtError {
    DrtError::new(Tool::Dpl, 2, ErrorKind::IllegalPlacement(msg))
}

fn inconsistent(msg: String) -> DrtError {
    report_error!(Tool::Dpl, 3, "{}", msg);
    DrtError::new(Tool::Dpl, 3, ErrorKind::JournalInconsistency(msg))
}

pub struct DetailedMgr {
    rows: Vec<Row>,
    site_width: Dbu,
    occupancy: Vec<Vec<Option<CellId>>>,
    seg_of_site: Vec<Vec<Option<usize>>>,
    segments: Vec<Segment>,
    nodes: Vec<Node>,
    pins: Vec<PinAnchor>,
    nets: Vec<Vec<PinId>>,
    cell_nets: Vec<Vec<NetId>>,
    journal: Journal,
    trial: Option<(usize, u64)>,
}

impl DetailedMgr {
    /// Builds the grid from the design's rows and cells. Movable cells on
    /// a free, site-aligned position keep it; the rest go to the nearest
    /// free run of sites.
    pub fn new(design: &Design) -> DrtResult<Self> {
        let Some(first) = design.rows.first() else {
            return Err(DrtError::config(Tool::Dpl, 1, "design has no placement rows"));
        };
        let site_width = first.site_width;
        if site_width <= 0 || design.rows.iter().any(|r| r.site_width != site_width) {
            return Err(DrtError::config(Tool::Dpl, 1, "rows must share one positive site width"));
        }
        let mut rows = design.rows.clone();
        rows.sort_by_key(|r| (r.origin.y, r.origin.x));

        let nodes: Vec<Node> = design
            .cells
            .iter()
            .map(|c| Node {
                width: ((c.width + site_width - 1) / site_width).max(1) as u32,
                height: c.height,
                movable: !c.is_fixed && rows.iter().any(|r| r.height == c.height),
                slot: None,
                segment: None,
                pos: c.pos,
            })
            .collect();

        let mut blocked: Vec<Vec<bool>> = rows.iter().map(|r| vec![false; r.num_sites as usize]).collect();
        for (c, node) in design.cells.iter().zip(&nodes) {
            if node.movable {
                continue;
            }
            let rect = Rect::from_coords(c.pos.x, c.pos.y, c.pos.x + c.width, c.pos.y + c.height);
            for (ri, row) in rows.iter().enumerate() {
                let rb = row.bbox();
                if !rect.overlaps(&rb) {
                    continue;
                }
                let lo = (rect.min.x.max(rb.min.x) - row.origin.x) / site_width;
                let hi = (rect.max.x.min(rb.max.x) - row.origin.x + site_width - 1) / site_width;
                for s in lo.max(0)..hi.min(row.num_sites as Dbu) {
                    blocked[ri][s as usize] = true;
                }
            }
        }

        let mut segments = Vec::new();
        let mut seg_of_site = Vec::with_capacity(rows.len());
        for (ri, sites) in blocked.iter().enumerate() {
            let mut map = vec![None; sites.len()];
            let mut s = 0;
            while s < sites.len() {
                if sites[s] {
                    s += 1;
                    continue;
                }
                let start = s;
                while s < sites.len() && !sites[s] {
                    map[s] = Some(segments.len());
                    s += 1;
                }
                segments.push(Segment {
                    row: ri as u32,
                    start: start as u32,
                    end: s as u32,
                    cells: BTreeMap::new(),
                });
            }
            seg_of_site.push(map);
        }

        let pins = design
            .pins
            .iter()
            .map(|p| {
                let centre = p.bbox().map(|b| b.center());
                match (p.cell, centre) {
                    (Some(c), Some(at)) => PinAnchor::Cell(c, at - design.cells[c.index()].pos),
                    (Some(c), None) => PinAnchor::Cell(c, Point::new(0, 0)),
                    (None, at) => PinAnchor::Fixed(at.unwrap_or_default()),
                }
            })
            .collect();
        let nets: Vec<Vec<PinId>> = design.nets.iter().map(|n| n.pins.clone()).collect();
        let mut cell_nets = vec![Vec::new(); nodes.len()];
        for (i, pins) in nets.iter().enumerate() {
            for &p in pins {
                if let Some(c) = design.pin(p).cell {
                    cell_nets[c.index()].push(NetId::new(i));
                }
            }
        }
        for v in &mut cell_nets {
            v.sort_unstable();
            v.dedup();
        }

        let mut mgr = Self {
            occupancy: rows.iter().map(|r| vec![None; r.num_sites as usize]).collect(),
            rows,
            site_width,
            seg_of_site,
            segments,
            nodes,
            pins,
            nets,
            cell_nets,
            journal: Journal::new(),
            trial: None,
        };
        mgr.initial_placement();
        Ok(mgr)
    }

    fn initial_placement(&mut self) {
        let mut pending = Vec::new();
        for i in 0..self.nodes.len() {
            let cell = CellId::new(i);
            if !self.nodes[i].movable {
                continue;
            }
            match self.aligned_slot(self.nodes[i].pos) {
                Some(slot) if self.can_place(cell, slot) => self.set_slot(cell, Some(slot)),
                _ => pending.push(cell),
            }
        }
        let mut stranded = 0;
        for &cell in &pending {
            match self.nearest_free_slot(cell, self.nodes[cell.index()].pos) {
                Some(slot) => self.set_slot(cell, Some(slot)),
                None => {
                    report_warn!(Tool::Dpl, 4, "no legal site for cell {:?}", cell);
                    stranded += 1;
                }
            }
        }
        report_info!(
            Tool::Dpl,
            5,
            "{} rows, {} segments, {} cells moved onto sites, {} left unplaced",
            self.rows.len(),
            self.segments.len(),
            pending.len() - stranded,
            stranded
        );
    }

    fn aligned_slot(&self, p: Point) -> Option<Slot> {
        let r = self.rows.iter().position(|r| r.origin.y == p.y)?;
        let row = &self.rows[r];
        let dx = p.x - row.origin.x;
        if dx < 0 || dx % self.site_width != 0 || dx / self.site_width >= row.num_sites as Dbu {
            return None;
        }
        Some((r as u32, (dx / self.site_width) as u32))
    }

    /// Closest legal slot for `cell` near `target`, vertical distance
    /// weighted double. Ties go to the lower row, then the lower site.
    pub fn nearest_free_slot(&self, cell: CellId, target: Point) -> Option<Slot> {
        let node = &self.nodes[cell.index()];
        let mut best: Option<(Dbu, Slot)> = None;
        for seg in &self.segments {
            let row = &self.rows[seg.row as usize];
            if row.height != node.height || seg.num_sites() < node.width {
                continue;
            }
            let y_cost = 2 * (row.origin.y - target.y).abs();
            if best.is_some_and(|(b, _)| y_cost >= b) {
                continue;
            }
            let ideal = (target.x - row.origin.x).div_euclid(self.site_width);
            for (a, b) in self.free_runs(seg, cell) {
                if b - a < node.width {
                    continue;
                }
                let s = ideal.clamp(a as Dbu, (b - node.width) as Dbu) as u32;
                let x = row.origin.x + s as Dbu * self.site_width;
                let cost = (x - target.x).abs() + y_cost;
                if best.is_none_or(|(b, _)| cost < b) {
                    best = Some((cost, (seg.row, s)));
                }
            }
        }
        best.map(|(_, slot)| slot)
    }

    /// Free site intervals of `seg`, treating `cell`'s own sites as free.
    fn free_runs(&self, seg: &Segment, cell: CellId) -> Vec<(u32, u32)> {
        let mut runs = Vec::new();
        let mut cur = seg.start;
        for (&s, &c) in &seg.cells {
            if c == cell {
                continue;
            }
            if s > cur {
                runs.push((cur, s));
            }
            cur = cur.max(s + self.nodes[c.index()].width);
        }
        if seg.end > cur {
            runs.push((cur, seg.end));
        }
        runs
    }

    pub fn can_place(&self, cell: CellId, (r, s): Slot) -> bool {
        let node = &self.nodes[cell.index()];
        let Some(row) = self.rows.get(r as usize) else {
            return false;
        };
        if !node.movable || row.height != node.height {
            return false;
        }
        if s.checked_add(node.width).is_none_or(|end| end > row.num_sites) {
            return false;
        }
        let segs = &self.seg_of_site[r as usize];
        let Some(seg) = segs[s as usize] else {
            return false;
        };
        (s..s + node.width).all(|k| {
            segs[k as usize] == Some(seg)
                && self.occupancy[r as usize][k as usize].is_none_or(|c| c == cell)
        })
    }

    /// Unjournaled state change shared by the primitives and replay.
    fn set_slot(&mut self, cell: CellId, slot: Option<Slot>) {
        let width = self.nodes[cell.index()].width;
        if let Some((r, s)) = self.nodes[cell.index()].slot.take() {
            for k in s..s + width {
                self.occupancy[r as usize][k as usize] = None;
            }
            if let Some(seg) = self.nodes[cell.index()].segment.take() {
                self.segments[seg].cells.remove(&s);
            }
        }
        if let Some((r, s)) = slot {
            for k in s..s + width {
                self.occupancy[r as usize][k as usize] = Some(cell);
            }
            let seg = self.seg_of_site[r as usize][s as usize];
            if let Some(seg) = seg {
                self.segments[seg].cells.insert(s, cell);
            }
            let pos = self.slot_position((r, s));
            let node = &mut self.nodes[cell.index()];
            node.segment = seg;
            node.slot = Some((r, s));
            node.pos = pos;
        }
    }

    pub fn slot_position(&self, (r, s): Slot) -> Point {
        let row = &self.rows[r as usize];
        Point::new(row.origin.x + s as Dbu * self.site_width, row.origin.y)
    }

    pub fn place(&mut self, cell: CellId, to: Slot) -> DrtResult<()> {
        if self.nodes[cell.index()].slot.is_some() {
            return Err(illegal(format!("{:?} is already placed", cell)));
        }
        if !self.can_place(cell, to) {
            return Err(illegal(format!("{:?} does not fit at {:?}", cell, to)));
        }
        self.set_slot(cell, Some(to));
        self.journal.add_action(JournalAction::Place { cell, to });
        Ok(())
    }

    pub fn unplace(&mut self, cell: CellId) -> DrtResult<()> {
        let Some(from) = self.nodes[cell.index()].slot else {
            return Err(illegal(format!("{:?} is not placed", cell)));
        };
        if !self.nodes[cell.index()].movable {
            return Err(illegal(format!("{:?} is fixed", cell)));
        }
        self.set_slot(cell, None);
        self.journal.add_action(JournalAction::Unplace { cell, from });
        Ok(())
    }

    pub fn move_cell(&mut self, cell: CellId, to: Slot) -> DrtResult<()> {
        let Some(from) = self.nodes[cell.index()].slot else {
            return Err(illegal(format!("{:?} is not placed", cell)));
        };
        if from == to {
            return Ok(());
        }
        if !self.can_place(cell, to) {
            return Err(illegal(format!("{:?} does not fit at {:?}", cell, to)));
        }
        self.set_slot(cell, Some(to));
        self.journal.add_action(JournalAction::Move { cell, from, to });
        Ok(())
    }

    /// Exchanges two placed cells of equal footprint.
    pub fn swap(&mut self, a: CellId, b: CellId) -> DrtResult<()> {
        let (na, nb) = (&self.nodes[a.index()], &self.nodes[b.index()]);
        let (Some(sa), Some(sb)) = (na.slot, nb.slot) else {
            return Err(illegal(format!("swap of unplaced {:?} / {:?}", a, b)));
        };
        if a == b || na.width != nb.width || na.height != nb.height {
            return Err(illegal(format!("{:?} and {:?} differ in footprint", a, b)));
        }
        self.unplace(a)?;
        self.move_cell(b, sa)?;
        self.place(a, sb)
    }

    fn replay(&mut self, cell: CellId, expect: Option<Slot>, target: Option<Slot>) -> DrtResult<()> {
        let now = self.nodes[cell.index()].slot;
        if now != expect {
            return Err(inconsistent(format!(
                "{:?} found at {:?}, journal expected {:?}",
                cell, now, expect
            )));
        }
        if let Some(t) = target
            && !self.can_place(cell, t)
        {
            return Err(inconsistent(format!("{:?} cannot return to {:?}", cell, t)));
        }
        self.set_slot(cell, target);
        Ok(())
    }

    /// Reverts the latest action. Returns false when there is none.
    pub fn undo(&mut self) -> DrtResult<bool> {
        let Some(a) = self.journal.pop_done() else {
            return Ok(false);
        };
        self.replay(a.cell(), a.after(), a.before())?;
        self.journal.push_undone(a);
        Ok(true)
    }

    pub fn redo(&mut self) -> DrtResult<bool> {
        let Some(a) = self.journal.pop_undone() else {
            return Ok(false);
        };
        self.replay(a.cell(), a.before(), a.after())?;
        self.journal.push_done(a);
        Ok(true)
    }

    pub fn undo_all(&mut self) -> DrtResult<usize> {
        let mut n = 0;
        while self.undo()? {
            n += 1;
        }
        Ok(n)
    }

    pub fn redo_all(&mut self) -> DrtResult<usize> {
        let mut n = 0;
        while self.redo()? {
            n += 1;
        }
        Ok(n)
    }

    pub fn begin_trial(&mut self) {
        self.trial = Some((self.journal.len(), self.checksum()));
    }

    pub fn accept_trial(&mut self) {
        self.trial = None;
    }

    /// Undoes every action since `begin_trial` and checks that occupancy
    /// is back to the recorded state. Rejected actions cannot be redone.
    pub fn undo_trial(&mut self) -> DrtResult<()> {
        let Some((mark, sum)) = self.trial.take() else {
            return Ok(());
        };
        while self.journal.len() > mark {
            self.undo()?;
        }
        self.journal.discard_redo();
        let now = self.checksum();
        if now != sum {
            return Err(inconsistent(format!(
                "occupancy checksum {:016x} after undo, expected {:016x}",
                now, sum
            )));
        }
        Ok(())
    }

    /// FNV-1a over every cell slot and every site.
    pub fn checksum(&self) -> u64 {
        const PRIME: u64 = 0x0000_0100_0000_01b3;
        let mut h: u64 = 0xcbf2_9ce4_8422_2325;
        let mut feed = |v: u64| {
            for b in v.to_le_bytes() {
                h ^= b as u64;
                h = h.wrapping_mul(PRIME);
            }
        };
        for n in &self.nodes {
            match n.slot {
                Some((r, s)) => feed(((r as u64) << 32) | s as u64),
                None => feed(u64::MAX),
            }
        }
        for row in &self.occupancy {
            for site in row {
                feed(site.map_or(0, |c| c.0 as u64 + 1));
            }
        }
        h
    }

    /// Every placed cell covers exactly its sites and sits in one segment.
    pub fn is_consistent(&self) -> bool {
        let mut covered = 0usize;
        for (i, n) in self.nodes.iter().enumerate() {
            let cell = CellId::new(i);
            let Some((r, s)) = n.slot else {
                continue;
            };
            let Some(seg) = n.segment else {
                return false;
            };
            if self.segments[seg].cells.get(&s) != Some(&cell) {
                return false;
            }
            if (s..s + n.width).any(|k| self.occupancy[r as usize][k as usize] != Some(cell)) {
                return false;
            }
            covered += n.width as usize;
        }
        let occupied: usize = self.occupancy.iter().map(|r| r.iter().flatten().count()).sum();
        occupied == covered
    }

    pub fn pin_position(&self, pin: PinId) -> Point {
        match self.pins[pin.index()] {
            PinAnchor::Cell(c, off) => self.nodes[c.index()].pos + off,
            PinAnchor::Fixed(p) => p,
        }
    }

    pub fn pin_cell(&self, pin: PinId) -> Option<CellId> {
        match self.pins[pin.index()] {
            PinAnchor::Cell(c, _) => Some(c),
            PinAnchor::Fixed(_) => None,
        }
    }

    pub fn net_hpwl(&self, net: NetId) -> Dbu {
        let pins = &self.nets[net.index()];
        if pins.len() < 2 {
            return 0;
        }
        pins.iter()
            .map(|&p| {
                let q = self.pin_position(p);
                Rect::new(q, q)
            })
            .reduce(|a, b| a.merge(&b))
            .map_or(0, |b| b.width() + b.height())
    }

    pub fn hpwl(&self) -> Dbu {
        (0..self.nets.len()).map(|n| self.net_hpwl(NetId::new(n))).sum()
    }

    pub fn num_cells(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, r: u32) -> &Row {
        &self.rows[r as usize]
    }

    pub fn site_width(&self) -> Dbu {
        self.site_width
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_movable(&self, cell: CellId) -> bool {
        self.nodes[cell.index()].movable
    }

    pub fn slot(&self, cell: CellId) -> Option<Slot> {
        self.nodes[cell.index()].slot
    }

    pub fn position(&self, cell: CellId) -> Point {
        self.nodes[cell.index()].pos
    }

    pub fn width_sites(&self, cell: CellId) -> u32 {
        self.nodes[cell.index()].width
    }

    pub fn cell_at(&self, (r, s): Slot) -> Option<CellId> {
        self.occupancy.get(r as usize)?.get(s as usize).copied().flatten()
    }

    pub fn cell_nets(&self, cell: CellId) -> &[NetId] {
        &self.cell_nets[cell.index()]
    }

    pub fn net_pins(&self, net: NetId) -> &[PinId] {
        &self.nets[net.index()]
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn journal_mut(&mut self) -> &mut Journal {
        &mut self.journal
    }

    /// Writes positions back, shifting the pins of moved cells. Routes of
    /// nets on moved cells are dropped. Returns the number of moved cells.
    pub fn commit(&self, design: &mut Design) -> usize {
        let mut moved = 0;
        for (i, n) in self.nodes.iter().enumerate() {
            let cell = &mut design.cells[i];
            if cell.pos == n.pos {
                continue;
            }
            let delta = n.pos - cell.pos;
            cell.pos = n.pos;
            moved += 1;
            for &net in &self.cell_nets[i] {
                design.nets[net.index()].route.clear();
            }
            let id = CellId::new(i);
            for pin in design.pins.iter_mut().filter(|p| p.cell == Some(id)) {
                for (_, r) in &mut pin.shapes {
                    *r = Rect::new(r.min + delta, r.max + delta);
                }
            }
        }
        log::info!(target: "dpl", "committed {} moved cells", moved);
        moved
    }
}
