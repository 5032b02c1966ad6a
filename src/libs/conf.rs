use std::collections::HashMap;
use std::io::BufRead;

/// Environment variables override config-file values under this prefix,
/// e.g. `PHYG_BACKBONE_MAX_DISTANCE`.
pub const ENV_PREFIX: &str = "PHYG_";

/// Keys the pipeline understands. Anything else in a config file earns a
/// warning and is ignored, so forward-compatible files keep working.
pub const KNOWN_KEYS: [&str; 9] = [
    "BACKBONE_MAX_DISTANCE",
    "BACKBONE_MIN_COVERAGE",
    "BACKBONE_MAX_COVERAGE",
    "EXEMPLAR_CAP",
    "CLADE_MAX_DISTANCE",
    "CLADE_MIN_DENSITY",
    "CLADE_TAXON_MIN_MARKERS",
    "CLADE_MAX_MARKERS",
    "RANDOM_SEED",
];

/// Layered run configuration: config file < environment < CLI flags.
/// The CLI layer is applied by each command after loading.
#[derive(Debug, Default, Clone)]
pub struct Conf {
    values: HashMap<String, String>,
}

impl Conf {
    /// Load defaults from an optional `key = value` file, then overlay
    /// `PHYG_*` environment variables for known keys.
    pub fn load(conf_file: Option<&str>) -> anyhow::Result<Conf> {
        let mut conf = Conf::default();

        if let Some(infile) = conf_file {
            ensure_input(infile)?;
            let reader = intspan::reader(infile);
            for line in reader.lines().map_while(Result::ok) {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                let Some((key, value)) = line.split_once('=') else {
                    eprintln!("Warning: malformed config line skipped: {}", line);
                    continue;
                };
                let key = key.trim().to_ascii_uppercase();
                if !KNOWN_KEYS.contains(&key.as_str()) {
                    eprintln!("Warning: unknown config key {}, using default", key);
                    continue;
                }
                conf.values.insert(key, value.trim().to_string());
            }
        }

        for key in KNOWN_KEYS {
            if let Ok(value) = std::env::var(format!("{}{}", ENV_PREFIX, key)) {
                conf.values.insert(key.to_string(), value);
            }
        }

        Ok(conf)
    }

    pub fn get_f64(&self, key: &str, default: f64) -> f64 {
        match self.values.get(key) {
            Some(v) => v.parse().unwrap_or_else(|_| {
                eprintln!("Warning: config {} is not a number, using default", key);
                default
            }),
            None => default,
        }
    }

    pub fn get_usize(&self, key: &str, default: usize) -> usize {
        match self.values.get(key) {
            Some(v) => v.parse().unwrap_or_else(|_| {
                eprintln!("Warning: config {} is not an integer, using default", key);
                default
            }),
            None => default,
        }
    }

    pub fn get_u64(&self, key: &str, default: u64) -> u64 {
        match self.values.get(key) {
            Some(v) => v.parse().unwrap_or_else(|_| {
                eprintln!("Warning: config {} is not an integer, using default", key);
                default
            }),
            None => default,
        }
    }
}

/// Backbone exemplar selection thresholds (Pass A).
#[derive(Debug, Clone, Copy)]
pub struct BackboneFilter {
    /// Clusters above this mean distance are too saturated for the backbone
    pub max_distance: f64,
    /// A taxon must appear in at least this many qualifying clusters
    pub min_coverage: usize,
    /// ... and contributes to at most this many in the matrix
    pub max_coverage: usize,
    /// Exemplars kept per genus
    pub exemplar_cap: usize,
}

impl BackboneFilter {
    pub fn from_conf(conf: &Conf) -> BackboneFilter {
        BackboneFilter {
            max_distance: conf.get_f64("BACKBONE_MAX_DISTANCE", 0.25),
            min_coverage: conf.get_usize("BACKBONE_MIN_COVERAGE", 3),
            max_coverage: conf.get_usize("BACKBONE_MAX_COVERAGE", 10),
            exemplar_cap: conf.get_usize("EXEMPLAR_CAP", 2),
        }
    }
}

/// Clade decomposition thresholds (Pass B).
#[derive(Debug, Clone, Copy)]
pub struct CladeFilter {
    pub max_distance: f64,
    /// Minimum fraction of clade taxa a cluster must cover
    pub min_density: f64,
    /// Taxa contributing fewer markers than this are not worth a cluster
    pub taxon_min_markers: usize,
    /// Cap on markers per clade; densest clusters win when truncating
    pub max_markers: usize,
}

impl CladeFilter {
    pub fn from_conf(conf: &Conf) -> CladeFilter {
        CladeFilter {
            max_distance: conf.get_f64("CLADE_MAX_DISTANCE", 0.35),
            min_density: conf.get_f64("CLADE_MIN_DENSITY", 0.3),
            taxon_min_markers: conf.get_usize("CLADE_TAXON_MIN_MARKERS", 1),
            max_markers: conf.get_usize("CLADE_MAX_MARKERS", 10),
        }
    }
}

/// Fatal-stage input check: the file must exist and be non-empty.
pub fn ensure_input(infile: &str) -> anyhow::Result<()> {
    if infile == "stdin" {
        return Ok(());
    }
    let path = std::path::Path::new(infile);
    let meta = std::fs::metadata(path)
        .map_err(|_| anyhow::anyhow!("Required input file {} is missing", infile))?;
    if meta.len() == 0 {
        return Err(anyhow::anyhow!("Required input file {} is empty", infile));
    }
    Ok(())
}
