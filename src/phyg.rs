extern crate clap;
use clap::*;

mod cmd_phyg;

fn main() -> anyhow::Result<()> {
    let app = Command::new("phyg")
        .version(crate_version!())
        .author(crate_authors!())
        .about("`phyg` - Phylogenetic pipeline: backbone inference and clade grafting")
        .propagate_version(true)
        .arg_required_else_help(true)
        .color(ColorChoice::Auto)
        .subcommand(cmd_phyg::taxize::make_subcommand())
        .subcommand(cmd_phyg::classify::make_subcommand())
        .subcommand(cmd_phyg::bbmerge::make_subcommand())
        .subcommand(cmd_phyg::bbinfer::make_subcommand())
        .subcommand(cmd_phyg::bbreroot::make_subcommand())
        .subcommand(cmd_phyg::bbcalibrate::make_subcommand())
        .subcommand(cmd_phyg::consense::make_subcommand())
        .subcommand(cmd_phyg::bbdecompose::make_subcommand())
        .subcommand(cmd_phyg::clademerge::make_subcommand())
        .subcommand(cmd_phyg::cladeinfer::make_subcommand())
        .subcommand(cmd_phyg::cladegraft::make_subcommand())
        .after_help(
            r###"Pipeline stages, in running order:

* Taxa:
    * taxize   - Resolve taxon names against a reference taxonomy
    * classify - Build the classification tree from the taxa table

* Backbone:
    * bbmerge     - Select exemplars and build the backbone supermatrix
    * bbinfer     - Infer the backbone tree (raxml|examl|exabayes|phyml)
    * bbreroot    - Reroot the backbone on an outgroup
    * bbcalibrate - Calibrate the backbone into a chronogram

* Clades:
    * bbdecompose - Decompose the remaining taxa into monophyletic clades
    * clademerge  - Bundle per-clade alignments into NeXML
    * cladeinfer  - Infer per-clade trees
    * consense    - Majority-rule consensus of a tree sample
    * cladegraft  - Graft clade trees onto the chronogram

Thresholds come from CLI flags, `PHYG_*` environment variables, or a
`--conf` key=value file, in that order of precedence.

"###,
        );

    // Check which subcomamnd the user ran...
    match app.get_matches().subcommand() {
        Some(("taxize", sub_matches)) => cmd_phyg::taxize::execute(sub_matches),
        Some(("classify", sub_matches)) => cmd_phyg::classify::execute(sub_matches),
        Some(("bbmerge", sub_matches)) => cmd_phyg::bbmerge::execute(sub_matches),
        Some(("bbinfer", sub_matches)) => cmd_phyg::bbinfer::execute(sub_matches),
        Some(("bbreroot", sub_matches)) => cmd_phyg::bbreroot::execute(sub_matches),
        Some(("bbcalibrate", sub_matches)) => cmd_phyg::bbcalibrate::execute(sub_matches),
        Some(("consense", sub_matches)) => cmd_phyg::consense::execute(sub_matches),
        Some(("bbdecompose", sub_matches)) => cmd_phyg::bbdecompose::execute(sub_matches),
        Some(("clademerge", sub_matches)) => cmd_phyg::clademerge::execute(sub_matches),
        Some(("cladeinfer", sub_matches)) => cmd_phyg::cladeinfer::execute(sub_matches),
        Some(("cladegraft", sub_matches)) => cmd_phyg::cladegraft::execute(sub_matches),
        _ => unreachable!(),
    }
}
