use crate::libs::cluster::AlignmentCluster;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;
use std::io::{BufRead, Write};

/// Write a pragmatic NeXML document: one shared `<otus>` block plus one
/// DNA `<characters>` block per cluster. This is the per-clade interchange
/// format between `clademerge` and `cladeinfer`.
pub fn write_nexml<W: Write>(clusters: &[AlignmentCluster], writer: &mut W) -> anyhow::Result<()> {
    let mut taxa: BTreeSet<&str> = BTreeSet::new();
    for cluster in clusters {
        taxa.extend(cluster.taxa());
    }

    writer.write_fmt(format_args!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n"))?;
    writer.write_fmt(format_args!(
        "<nex:nexml version=\"0.9\" xmlns:nex=\"http://www.nexml.org/2009\" xmlns=\"http://www.nexml.org/2009\" xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\">\n"
    ))?;

    writer.write_fmt(format_args!("  <otus id=\"taxa1\">\n"))?;
    for taxon in &taxa {
        writer.write_fmt(format_args!(
            "    <otu id=\"t{}\" label=\"{}\"/>\n",
            taxon, taxon
        ))?;
    }
    writer.write_fmt(format_args!("  </otus>\n"))?;

    for cluster in clusters {
        writer.write_fmt(format_args!(
            "  <characters id=\"{}\" otus=\"taxa1\" xsi:type=\"nex:DnaSeqs\">\n",
            cluster.id
        ))?;
        writer.write_fmt(format_args!("    <matrix>\n"))?;
        for (taxon, seq) in &cluster.seqs {
            writer.write_fmt(format_args!(
                "      <row id=\"r_{}_{}\" otu=\"t{}\">\n        <seq>{}</seq>\n      </row>\n",
                cluster.id, taxon, taxon, seq
            ))?;
        }
        writer.write_fmt(format_args!("    </matrix>\n"))?;
        writer.write_fmt(format_args!("  </characters>\n"))?;
    }

    writer.write_fmt(format_args!("</nex:nexml>\n"))?;
    Ok(())
}

lazy_static! {
    static ref RE_CHARACTERS: Regex = Regex::new(r#"<characters\s+id="([^"]+)""#).unwrap();
    static ref RE_ROW: Regex = Regex::new(r#"<row\s+[^>]*otu="t([^"]+)""#).unwrap();
    static ref RE_SEQ: Regex = Regex::new(r#"<seq>([^<]*)</seq>"#).unwrap();
}

/// Read back the subset written by `write_nexml`. Line-oriented: each tag
/// of interest sits on its own line, as we produce it.
pub fn read_nexml(infile: &str) -> anyhow::Result<Vec<AlignmentCluster>> {
    let reader = intspan::reader(infile);

    let mut clusters: Vec<AlignmentCluster> = Vec::new();
    let mut pending_taxon: Option<String> = None;

    for line in reader.lines().map_while(Result::ok) {
        if let Some(caps) = RE_CHARACTERS.captures(&line) {
            clusters.push(AlignmentCluster {
                id: caps[1].to_string(),
                seqs: Vec::new(),
            });
            pending_taxon = None;
            continue;
        }

        if let Some(caps) = RE_ROW.captures(&line) {
            pending_taxon = Some(caps[1].to_string());
            continue;
        }

        if let Some(caps) = RE_SEQ.captures(&line) {
            let taxon = match pending_taxon.take() {
                Some(t) => t,
                None => continue,
            };
            match clusters.last_mut() {
                Some(cluster) => cluster.seqs.push((taxon, caps[1].to_string())),
                None => {
                    return Err(anyhow::anyhow!(
                        "Malformed NeXML in {}: <seq> outside <characters>",
                        infile
                    ))
                }
            }
        }
    }

    if clusters.is_empty() {
        return Err(anyhow::anyhow!("No characters blocks found in {}", infile));
    }

    Ok(clusters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn round_trip() {
        let clusters = vec![
            AlignmentCluster {
                id: "c1".to_string(),
                seqs: vec![
                    ("101".to_string(), "ACGT".to_string()),
                    ("102".to_string(), "ACGA".to_string()),
                ],
            },
            AlignmentCluster {
                id: "c2".to_string(),
                seqs: vec![("101".to_string(), "TTTT".to_string())],
            },
        ];

        let mut buf = Vec::new();
        write_nexml(&clusters, &mut buf).unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&buf).unwrap();

        let loaded = read_nexml(file.path().to_str().unwrap()).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, "c1");
        assert_eq!(loaded[0].seqs[1], ("102".to_string(), "ACGA".to_string()));
        assert_eq!(loaded[1].seqs[0].1, "TTTT");
    }
}
