use crate::libs::cluster::AlignmentCluster;
use std::io::{BufRead, Write};

/// A concatenated alignment: one row per taxon, one column block per
/// cluster, with missing data padded as gaps.
#[derive(Debug, Clone, Default)]
pub struct Supermatrix {
    pub taxa: Vec<String>,
    pub rows: Vec<String>,
    /// (cluster id, start, end), 1-based inclusive columns
    pub partitions: Vec<(String, usize, usize)>,
}

impl Supermatrix {
    /// Concatenate clusters over a fixed taxon ordering. A taxon absent
    /// from a cluster gets a gap block of that cluster's width.
    pub fn concat(clusters: &[AlignmentCluster], taxa: &[String]) -> Supermatrix {
        let mut rows = vec![String::new(); taxa.len()];
        let mut partitions = Vec::new();
        let mut offset = 0usize;

        for cluster in clusters {
            let width = cluster.width();
            if width == 0 {
                continue;
            }

            for (i, taxon) in taxa.iter().enumerate() {
                match cluster.seqs.iter().find(|(t, _)| t == taxon) {
                    Some((_, seq)) => rows[i].push_str(seq),
                    None => rows[i].push_str(&"-".repeat(width)),
                }
            }

            partitions.push((cluster.id.clone(), offset + 1, offset + width));
            offset += width;
        }

        Supermatrix {
            taxa: taxa.to_vec(),
            rows,
            partitions,
        }
    }

    pub fn ntax(&self) -> usize {
        self.taxa.len()
    }

    pub fn nchar(&self) -> usize {
        self.rows.first().map(|r| r.len()).unwrap_or(0)
    }

    /// Write as relaxed PHYLIP: header `ntax nchar`, then one
    /// `label  sequence` row per taxon.
    pub fn write_phylip<W: Write>(&self, writer: &mut W) -> anyhow::Result<()> {
        writer.write_fmt(format_args!("{} {}\n", self.ntax(), self.nchar()))?;
        for (taxon, row) in self.taxa.iter().zip(self.rows.iter()) {
            writer.write_fmt(format_args!("{}  {}\n", taxon, row))?;
        }
        Ok(())
    }

    /// Write a RAxML-style partition table.
    pub fn write_partitions<W: Write>(&self, writer: &mut W) -> anyhow::Result<()> {
        for (id, start, end) in &self.partitions {
            writer.write_fmt(format_args!("DNA, {} = {}-{}\n", id, start, end))?;
        }
        Ok(())
    }

    /// Read a relaxed PHYLIP file back. Partition information is not part
    /// of the format and comes back empty.
    pub fn from_phylip(infile: &str) -> anyhow::Result<Supermatrix> {
        let reader = intspan::reader(infile);
        let mut lines = reader.lines().map_while(Result::ok);

        let header = lines
            .next()
            .ok_or_else(|| anyhow::anyhow!("Empty PHYLIP file {}", infile))?;
        let mut parts = header.split_whitespace();
        let ntax: usize = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| anyhow::anyhow!("Bad PHYLIP header in {}", infile))?;
        let nchar: usize = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| anyhow::anyhow!("Bad PHYLIP header in {}", infile))?;

        let mut taxa = Vec::new();
        let mut rows = Vec::new();
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            let mut parts = line.split_whitespace();
            let (Some(label), Some(seq)) = (parts.next(), parts.next()) else {
                return Err(anyhow::anyhow!("Malformed PHYLIP row in {}", infile));
            };
            if seq.len() != nchar {
                return Err(anyhow::anyhow!(
                    "PHYLIP row {} has {} columns, header says {}",
                    label,
                    seq.len(),
                    nchar
                ));
            }
            taxa.push(label.to_string());
            rows.push(seq.to_string());
        }

        if taxa.len() != ntax {
            return Err(anyhow::anyhow!(
                "PHYLIP file {} has {} rows, header says {}",
                infile,
                taxa.len(),
                ntax
            ));
        }

        Ok(Supermatrix {
            taxa,
            rows,
            partitions: Vec::new(),
        })
    }

    /// Resample columns with replacement for one bootstrap replicate.
    /// Seeding per replicate keeps runs reproducible; partition boundaries
    /// are meaningless after resampling and are dropped.
    pub fn bootstrap_columns(&self, seed: u64) -> Supermatrix {
        use rand::{Rng, SeedableRng};

        let nchar = self.nchar();
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let picks: Vec<usize> = (0..nchar).map(|_| rng.gen_range(0..nchar)).collect();

        let rows = self
            .rows
            .iter()
            .map(|row| {
                let bytes = row.as_bytes();
                picks.iter().map(|&i| bytes[i] as char).collect()
            })
            .collect();

        Supermatrix {
            taxa: self.taxa.clone(),
            rows,
            partitions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster(id: &str, rows: &[(&str, &str)]) -> AlignmentCluster {
        AlignmentCluster {
            id: id.to_string(),
            seqs: rows
                .iter()
                .map(|(t, s)| (t.to_string(), s.to_string()))
                .collect(),
        }
    }

    #[test]
    fn concat_pads_missing_taxa() {
        let clusters = vec![
            cluster("c1", &[("a", "ACGT"), ("b", "ACGA")]),
            cluster("c2", &[("a", "TT"), ("c", "TC")]),
        ];
        let taxa = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        let matrix = Supermatrix::concat(&clusters, &taxa);
        assert_eq!(matrix.ntax(), 3);
        assert_eq!(matrix.nchar(), 6);
        assert_eq!(matrix.rows[0], "ACGTTT");
        assert_eq!(matrix.rows[1], "ACGA--");
        assert_eq!(matrix.rows[2], "----TC");

        assert_eq!(
            matrix.partitions,
            vec![
                ("c1".to_string(), 1, 4),
                ("c2".to_string(), 5, 6),
            ]
        );
    }

    #[test]
    fn phylip_output() {
        let clusters = vec![cluster("c1", &[("a", "ACGT"), ("b", "ACGA")])];
        let taxa = vec!["a".to_string(), "b".to_string()];
        let matrix = Supermatrix::concat(&clusters, &taxa);

        let mut buf = Vec::new();
        matrix.write_phylip(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "2 4\na  ACGT\nb  ACGA\n");
    }
}
