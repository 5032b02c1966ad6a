use std::collections::BTreeSet;
use std::io::Write;

/// One orthologous alignment cluster: aligned sequences keyed by taxon id.
/// Clusters are never mutated in place; filtering produces derived clusters.
#[derive(Debug, Clone, Default)]
pub struct AlignmentCluster {
    pub id: String,
    /// (taxon id, aligned sequence)
    pub seqs: Vec<(String, String)>,
}

impl AlignmentCluster {
    /// Read an aligned FASTA file. Record names are taxon ids.
    pub fn from_fasta(infile: &str) -> anyhow::Result<AlignmentCluster> {
        let id = std::path::Path::new(infile)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(infile)
            .to_string();

        let reader = intspan::reader(infile);
        let mut fa_in = noodles_fasta::io::Reader::new(reader);

        let mut seqs = Vec::new();
        for result in fa_in.records() {
            let record = result?;
            let name = String::from_utf8(record.name().into())?;
            let seq = String::from_utf8(record.sequence().get(..).unwrap().to_vec())?;
            seqs.push((name, seq));
        }

        if seqs.is_empty() {
            return Err(anyhow::anyhow!("No sequences found in {}", infile));
        }

        Ok(AlignmentCluster { id, seqs })
    }

    /// Alignment width (all rows share the coordinate system).
    pub fn width(&self) -> usize {
        self.seqs.first().map(|(_, s)| s.len()).unwrap_or(0)
    }

    pub fn seq_count(&self) -> usize {
        self.seqs.len()
    }

    pub fn taxa(&self) -> BTreeSet<&str> {
        self.seqs.iter().map(|(t, _)| t.as_str()).collect()
    }

    pub fn contains(&self, taxon: &str) -> bool {
        self.seqs.iter().any(|(t, _)| t == taxon)
    }

    /// Derive a new cluster restricted to the given taxa, keeping row order.
    pub fn restrict(&self, keep: &BTreeSet<&str>) -> AlignmentCluster {
        AlignmentCluster {
            id: self.id.clone(),
            seqs: self
                .seqs
                .iter()
                .filter(|(t, _)| keep.contains(t.as_str()))
                .cloned()
                .collect(),
        }
    }

    /// Mean uncorrected pairwise distance (p-distance) over comparable
    /// columns. Gaps, Ns and other ambiguity codes are not comparable.
    /// Pairs without comparable columns are excluded from the mean.
    pub fn mean_distance(&self) -> f64 {
        let n = self.seqs.len();
        if n < 2 {
            return 0.0;
        }

        let mut sum = 0.0;
        let mut pairs = 0usize;

        for i in 0..n {
            for j in (i + 1)..n {
                if let Some(d) = p_distance(&self.seqs[i].1, &self.seqs[j].1) {
                    sum += d;
                    pairs += 1;
                }
            }
        }

        if pairs == 0 {
            0.0
        } else {
            sum / pairs as f64
        }
    }

    /// Fraction of `taxa` represented in this cluster.
    pub fn density(&self, taxa: &BTreeSet<&str>) -> f64 {
        if taxa.is_empty() {
            return 0.0;
        }
        let present = taxa.iter().filter(|t| self.contains(t)).count();
        present as f64 / taxa.len() as f64
    }

    pub fn write_fasta<W: Write>(&self, writer: &mut W) -> anyhow::Result<()> {
        for (taxon, seq) in &self.seqs {
            writer.write_fmt(format_args!(">{}\n{}\n", taxon, seq))?;
        }
        Ok(())
    }
}

fn is_comparable(c: u8) -> bool {
    matches!(c.to_ascii_uppercase(), b'A' | b'C' | b'G' | b'T' | b'U')
}

/// p-distance between two aligned rows; None if no column is comparable.
fn p_distance(a: &str, b: &str) -> Option<f64> {
    let mut comparable = 0usize;
    let mut mismatch = 0usize;

    for (x, y) in a.bytes().zip(b.bytes()) {
        if is_comparable(x) && is_comparable(y) {
            comparable += 1;
            if x.to_ascii_uppercase() != y.to_ascii_uppercase() {
                mismatch += 1;
            }
        }
    }

    if comparable == 0 {
        None
    } else {
        Some(mismatch as f64 / comparable as f64)
    }
}

/// Read a cluster list file (one FASTA path per line, `#` comments
/// ignored), resolving relative paths against the list's directory.
pub fn read_cluster_list(infile: &str) -> anyhow::Result<Vec<String>> {
    use std::io::BufRead;

    let base = std::path::Path::new(infile)
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_default();

    let reader = intspan::reader(infile);
    let mut paths = Vec::new();
    for line in reader.lines().map_while(Result::ok) {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let path = std::path::Path::new(line);
        let resolved = if path.is_absolute() || infile == "stdin" {
            path.to_path_buf()
        } else {
            base.join(path)
        };
        paths.push(resolved.display().to_string());
    }

    if paths.is_empty() {
        return Err(anyhow::anyhow!("No cluster paths found in {}", infile));
    }

    Ok(paths)
}
