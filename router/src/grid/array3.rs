use drt_common::geom::GridCoord;

/// Flat storage addressed by `(x, y, z)`, x fastest.
#[derive(Clone, Debug)]
pub struct Array3<T> {
    dims: (usize, usize, usize),
    data: Vec<T>,
}

impl<T: Clone> Array3<T> {
    pub fn new(x: usize, y: usize, z: usize, fill: T) -> Self {
        Self {
            dims: (x, y, z),
            data: vec![fill; x * y * z],
        }
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }
}

impl<T> Array3<T> {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline(always)]
    pub fn in_bounds(&self, c: GridCoord) -> bool {
        (c.x as usize) < self.dims.0 && (c.y as usize) < self.dims.1 && (c.z as usize) < self.dims.2
    }

    #[inline(always)]
    pub fn index(&self, c: GridCoord) -> usize {
        debug_assert!(self.in_bounds(c), "{:?} outside {:?}", c, self.dims);
        c.x as usize + self.dims.0 * (c.y as usize + self.dims.1 * c.z as usize)
    }

    #[inline(always)]
    pub fn coord(&self, idx: usize) -> GridCoord {
        let plane = self.dims.0 * self.dims.1;
        let z = idx / plane;
        let rem = idx % plane;
        GridCoord::new((rem % self.dims.0) as u32, (rem / self.dims.0) as u32, z as u8)
    }

    #[inline(always)]
    pub fn get(&self, c: GridCoord) -> &T {
        &self.data[self.index(c)]
    }

    #[inline(always)]
    pub fn get_mut(&mut self, c: GridCoord) -> &mut T {
        let idx = self.index(c);
        &mut self.data[idx]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.data.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_and_coord_round_trip() {
        let a = Array3::new(4, 3, 2, 0u8);
        for idx in 0..a.len() {
            assert_eq!(a.index(a.coord(idx)), idx);
        }
        assert_eq!(a.index(GridCoord::new(1, 2, 1)), 1 + 4 * (2 + 3));
        assert!(!a.in_bounds(GridCoord::new(4, 0, 0)));
    }
}
