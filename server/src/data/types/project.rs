/// A tenant project, seeded from the config file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: u32,
    pub name: String,
    /// Prometheus-compatible project: datapoints land in 15-second storage
    /// buckets instead of the default 60 seconds.
    pub prom_compat: bool,
}
