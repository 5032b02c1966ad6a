use itertools::Itertools;
use std::collections::BTreeSet;
use std::io::{BufRead, Write};

/// One age constraint: the node to date is the MRCA of `taxa`.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationPoint {
    pub name: String,
    pub min_age: f64,
    pub max_age: f64,
    pub taxa: BTreeSet<String>,
}

impl CalibrationPoint {
    /// The grouping key: two points constrain the same node exactly when
    /// their sorted taxon sets coincide.
    pub fn mrca_key(&self) -> String {
        self.taxa.iter().join(",")
    }
}

/// The full set of constraints fed to the calibration engine, which is
/// sensitive to input ordering; serialization is therefore stable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationTable {
    pub points: Vec<CalibrationPoint>,
}

impl CalibrationTable {
    /// Load a fossil table: TSV `#name  min_age  max_age  taxa`, taxa
    /// comma-separated. Malformed rows warn and are skipped.
    pub fn from_file(infile: &str) -> anyhow::Result<CalibrationTable> {
        let reader = intspan::reader(infile);
        let mut points = Vec::new();

        for line in reader.lines().map_while(Result::ok) {
            if line.starts_with('#') || line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 4 {
                eprintln!("Warning: malformed fossil row skipped: {}", line);
                continue;
            }

            let (min_age, max_age) = match (fields[1].parse::<f64>(), fields[2].parse::<f64>()) {
                (Ok(min), Ok(max)) => (min, max),
                _ => {
                    eprintln!("Warning: fossil row with non-numeric ages skipped: {}", line);
                    continue;
                }
            };

            let taxa: BTreeSet<String> = fields[3]
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();

            points.push(CalibrationPoint {
                name: fields[0].to_string(),
                min_age,
                max_age,
                taxa,
            });
        }

        if points.is_empty() {
            return Err(anyhow::anyhow!("No calibration points found in {}", infile));
        }

        Ok(CalibrationTable { points })
    }

    /// Collapse points constraining the same MRCA. When duplicates
    /// conflict, the oldest `max_age` wins: under-calibrating a node is
    /// the riskier mistake. Idempotent.
    pub fn deduplicate(&self) -> CalibrationTable {
        let mut by_key: indexmap::IndexMap<String, CalibrationPoint> = indexmap::IndexMap::new();

        for point in &self.points {
            let key = point.mrca_key();
            match by_key.get_mut(&key) {
                Some(existing) => {
                    if point.max_age > existing.max_age {
                        *existing = point.clone();
                    }
                }
                None => {
                    by_key.insert(key, point.clone());
                }
            }
        }

        CalibrationTable {
            points: by_key.into_values().collect(),
        }
    }

    /// Drop points naming a single taxon: a tip has no internal node to
    /// date.
    pub fn remove_orphan_taxa(&self) -> CalibrationTable {
        let points = self
            .points
            .iter()
            .filter(|p| {
                if p.taxa.len() < 2 {
                    eprintln!(
                        "Warning: calibration {} names a single taxon, dropped",
                        p.name
                    );
                    false
                } else {
                    true
                }
            })
            .cloned()
            .collect();

        CalibrationTable { points }
    }

    /// Stable output ordering: ascending minimum age, MRCA key as the
    /// tie-break, with generated unique labels per calibrated node.
    pub fn sorted(&self) -> CalibrationTable {
        let mut points = self.points.clone();
        points.sort_by(|a, b| {
            a.min_age
                .partial_cmp(&b.min_age)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.mrca_key().cmp(&b.mrca_key()))
        });
        for (i, point) in points.iter_mut().enumerate() {
            point.name = format!("cal{}", i + 1);
        }
        CalibrationTable { points }
    }

    /// The full preparation pass: dedup, orphan removal, stable ordering.
    pub fn prepare(&self) -> CalibrationTable {
        self.deduplicate().remove_orphan_taxa().sorted()
    }

    pub fn write_table<W: Write>(&self, writer: &mut W) -> anyhow::Result<()> {
        writer.write_fmt(format_args!("#name\tmin_age\tmax_age\ttaxa\n"))?;
        for point in &self.points {
            writer.write_fmt(format_args!(
                "{}\t{}\t{}\t{}\n",
                point.name,
                point.min_age,
                point.max_age,
                point.mrca_key()
            ))?;
        }
        Ok(())
    }

    /// Write a treePL configuration dating the given tree.
    pub fn write_treepl_config<W: Write>(
        &self,
        writer: &mut W,
        treefile: &str,
        numsites: usize,
        smooth: f64,
        outfile: &str,
    ) -> anyhow::Result<()> {
        writer.write_fmt(format_args!("treefile = {}\n", treefile))?;
        writer.write_fmt(format_args!("numsites = {}\n", numsites))?;
        writer.write_fmt(format_args!("smooth = {}\n", smooth))?;
        for point in &self.points {
            let taxa = point.taxa.iter().join(" ");
            writer.write_fmt(format_args!("mrca = {} {}\n", point.name, taxa))?;
            writer.write_fmt(format_args!("min = {} {}\n", point.name, point.min_age))?;
            writer.write_fmt(format_args!("max = {} {}\n", point.name, point.max_age))?;
        }
        writer.write_fmt(format_args!("outfile = {}\n", outfile))?;
        writer.write_fmt(format_args!("thorough\n"))?;
        Ok(())
    }
}
