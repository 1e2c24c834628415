use serde::Deserialize;

/// Run parameters. Built once (TOML file or defaults) and handed to the
/// routing and placement entry points by reference.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub global_routing: GlobalRoutingConfig,
    #[serde(default)]
    pub detailed_routing: DetailedRoutingConfig,
    #[serde(default)]
    pub drc: DrcConfig,
    #[serde(default)]
    pub placement: PlacementConfig,
    #[serde(default)]
    pub input: InputConfig,
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GridConfig {
    /// Collapse every layer into one direction-less plane.
    #[serde(default)]
    pub two_d: bool,
    #[serde(default = "default_via_cost_factor")]
    pub via_cost_factor: i64,
    /// GCell edge length in tracks when DEF has no GCELLGRID.
    #[serde(default = "default_gcell_tracks")]
    pub gcell_tracks: i64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            two_d: false,
            via_cost_factor: default_via_cost_factor(),
            gcell_tracks: default_gcell_tracks(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GlobalRoutingConfig {
    #[serde(default = "default_gr_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_gr_history_increment")]
    pub history_increment: u32,
    #[serde(default = "default_gr_overflow_penalty")]
    pub overflow_penalty: u32,
    /// Guide bloat in GCells around every routed GCell.
    #[serde(default = "default_gr_guide_bloat")]
    pub guide_bloat: u32,
}

impl Default for GlobalRoutingConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_gr_max_iterations(),
            history_increment: default_gr_history_increment(),
            overflow_penalty: default_gr_overflow_penalty(),
            guide_bloat: default_gr_guide_bloat(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetailedRoutingConfig {
    /// Ripup-and-reroute iterations inside one worker.
    #[serde(default = "default_dr_max_iterations")]
    pub max_iterations: usize,
    /// Worker tile edge length in GCells.
    #[serde(default = "default_tile_gcells")]
    pub tile_gcells: u32,
    /// Extension halo around a worker's route box, in GCells.
    #[serde(default = "default_halo")]
    pub halo: u32,
    #[serde(default = "default_max_expansions")]
    pub max_expansions: u32,
    #[serde(default = "default_shape_cost")]
    pub shape_cost: u32,
    #[serde(default = "default_marker_cost")]
    pub marker_cost: u32,
    /// Per-iteration multiplier on accumulated marker cost.
    #[serde(default = "default_marker_decay")]
    pub marker_decay: f64,
    #[serde(default = "default_guide_penalty")]
    pub guide_penalty: u32,
}

impl Default for DetailedRoutingConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_dr_max_iterations(),
            tile_gcells: default_tile_gcells(),
            halo: default_halo(),
            max_expansions: default_max_expansions(),
            shape_cost: default_shape_cost(),
            marker_cost: default_marker_cost(),
            marker_decay: default_marker_decay(),
            guide_penalty: default_guide_penalty(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DrcConfig {
    #[serde(default)]
    pub ignore_min_area: bool,
    #[serde(default)]
    pub ignore_min_step: bool,
    #[serde(default)]
    pub ignore_eol: bool,
    #[serde(default)]
    pub ignore_corner: bool,
    #[serde(default)]
    pub ignore_cut_spacing: bool,
    /// Skip pairs where both shapes are fixed design geometry.
    #[serde(default)]
    pub ignore_db: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlacementConfig {
    /// Move radius in sites.
    #[serde(default = "default_search_radius")]
    pub search_radius: i64,
    #[serde(default = "default_max_passes")]
    pub max_passes: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            search_radius: default_search_radius(),
            max_passes: default_max_passes(),
            seed: default_seed(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_lef_files")]
    pub lef_files: Vec<String>,
    #[serde(default = "default_def_file")]
    pub def_file: String,
    #[serde(default = "default_output_def")]
    pub output_def: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            lef_files: default_lef_files(),
            def_file: default_def_file(),
            output_def: default_output_def(),
        }
    }
}

fn default_via_cost_factor() -> i64 {
    2
}

fn default_gcell_tracks() -> i64 {
    15
}

fn default_gr_max_iterations() -> usize {
    30
}

fn default_gr_history_increment() -> u32 {
    1
}

fn default_gr_overflow_penalty() -> u32 {
    8
}

fn default_gr_guide_bloat() -> u32 {
    1
}

fn default_dr_max_iterations() -> usize {
    4
}

fn default_tile_gcells() -> u32 {
    8
}

fn default_halo() -> u32 {
    1
}

fn default_max_expansions() -> u32 {
    2_000_000
}

fn default_shape_cost() -> u32 {
    8
}

fn default_marker_cost() -> u32 {
    32
}

fn default_marker_decay() -> f64 {
    0.9
}

fn default_guide_penalty() -> u32 {
    4
}

fn default_search_radius() -> i64 {
    8
}

fn default_max_passes() -> usize {
    4
}

fn default_seed() -> u64 {
    42
}

fn default_lef_files() -> Vec<String> {
    vec!["inputs/simple.lef".to_string()]
}

fn default_def_file() -> String {
    "inputs/simple.def".to_string()
}

fn default_output_def() -> String {
    "output/routed.def".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = Config::from_toml(
            "[grid]\ntwo_d = true\n[detailed_routing]\nmax_iterations = 2\n",
        )
        .unwrap();
        assert!(cfg.grid.two_d);
        assert_eq!(cfg.grid.via_cost_factor, 2);
        assert_eq!(cfg.detailed_routing.max_iterations, 2);
        assert_eq!(cfg.detailed_routing.halo, 1);
        assert!(!cfg.drc.ignore_min_area);
    }
}
