//! Newick reading and writing.
//!
//! The structural grammar is driven by a recursive descender that builds
//! nodes directly into the arena; token-level pieces (labels, branch
//! lengths) are nom parsers. Trailing `[...]` comment blocks carry
//! `key=value` annotations in three dialects: `[&&NHX:id=9606:S=human]`,
//! `[&height=12.5,rate=0.3]` (Bayesian samplers and calibration tools),
//! and bare `[id=9606 S=human]`. Anything else in brackets is discarded.

use super::{NodeId, Tree, TreeError};
use nom::{
    branch::alt,
    bytes::complete::{is_not, take_while1},
    character::complete::char,
    combinator::map,
    number::complete::double,
    sequence::delimited,
    IResult, Parser,
};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Read;

/// Where a parse failed: the unconsumed input and what was expected.
struct Fail<'a> {
    rest: &'a str,
    expected: &'static str,
}

fn fail<'a, T>(rest: &'a str, expected: &'static str) -> Result<T, Fail<'a>> {
    Err(Fail { rest, expected })
}

fn positioned(input: &str, f: Fail) -> TreeError {
    let offset = input.len() - f.rest.len();
    let consumed = &input[..offset];
    let line = consumed.matches('\n').count() + 1;
    let column = offset - consumed.rfind('\n').map_or(0, |p| p + 1) + 1;

    TreeError::Parse {
        line,
        column,
        message: format!("expected {}", f.expected),
        near: f.rest.chars().take(40).collect(),
    }
}

/// A node label: quoted (single or double) or a bare word that stops at
/// Newick structural characters and whitespace.
fn label(input: &str) -> IResult<&str, String> {
    alt((
        delimited(
            char('\''),
            map(is_not("'"), str::to_string),
            char('\''),
        ),
        delimited(
            char('"'),
            map(is_not("\""), str::to_string),
            char('"'),
        ),
        map(
            take_while1(|c: char| !c.is_whitespace() && !"():;,[]".contains(c)),
            str::to_string,
        ),
    ))
    .parse(input)
}

fn annot_pairs(body: &str) -> BTreeMap<String, String> {
    let mut pairs = BTreeMap::new();
    let mut put = |chunk: &str| {
        if let Some((k, v)) = chunk.split_once('=') {
            pairs.insert(k.to_string(), v.to_string());
        }
    };

    if let Some(tail) = body.strip_prefix("&&NHX") {
        tail.split(':').for_each(&mut put);
    } else if let Some(tail) = body.strip_prefix('&') {
        tail.split(',').for_each(&mut put);
    } else {
        body.split_whitespace().for_each(&mut put);
    }
    pairs
}

/// Consume one `[...]` block if present, returning its annotations.
fn comment<'a>(input: &'a str) -> Result<(&'a str, BTreeMap<String, String>), Fail<'a>> {
    let Some(inner) = input.strip_prefix('[') else {
        return Ok((input, BTreeMap::new()));
    };
    match inner.split_once(']') {
        Some((body, rest)) => Ok((rest, annot_pairs(body))),
        None => fail(input, "closing ']'"),
    }
}

/// One node and, recursively, its children:
/// `(child,child,...)label[annots]:length[annots]`, every part optional.
fn read_node<'a>(tree: &mut Tree, input: &'a str) -> Result<(&'a str, NodeId), Fail<'a>> {
    let id = tree.add_node();
    let mut rest = input.trim_start();

    if let Some(open) = rest.strip_prefix('(') {
        rest = open;
        loop {
            let (after, child) = read_node(tree, rest)?;
            if tree.link(id, child).is_err() {
                return fail(after, "a well-formed subtree");
            }
            rest = after.trim_start();
            if let Some(more) = rest.strip_prefix(',') {
                rest = more;
            } else if let Some(done) = rest.strip_prefix(')') {
                rest = done;
                break;
            } else {
                return fail(rest, "',' or ')'");
            }
        }
        rest = rest.trim_start();
    }

    let mut name = None;
    if let Ok((after, text)) = label(rest) {
        if !text.is_empty() {
            name = Some(text);
        }
        rest = after.trim_start();
    }

    let (after, mut annots) = comment(rest)?;
    rest = after.trim_start();

    let mut length = None;
    if let Some(colon) = rest.strip_prefix(':') {
        let Ok((after, value)) = double::<_, nom::error::Error<&str>>(colon.trim_start()) else {
            return fail(rest, "a branch length");
        };
        length = Some(value);
        rest = after.trim_start();
    }

    let (after, more) = comment(rest)?;
    rest = after;
    annots.extend(more);

    if let Some(node) = tree.node_mut(id) {
        node.name = name;
        node.length = length;
        if !annots.is_empty() {
            node.annots = Some(annots);
        }
    }

    Ok((rest, id))
}

fn read_tree<'a>(input: &'a str) -> Result<(&'a str, Tree), Fail<'a>> {
    let mut tree = Tree::new();
    let (rest, root) = read_node(&mut tree, input)?;
    let rest = rest.trim_start();
    match rest.strip_prefix(';') {
        Some(rest) => {
            tree.set_root(root);
            Ok((rest, tree))
        }
        None => fail(rest, "';'"),
    }
}

/// Parse a single `;`-terminated Newick tree.
pub fn parse(input: &str) -> Result<Tree, TreeError> {
    read_tree(input)
        .map(|(_, tree)| tree)
        .map_err(|f| positioned(input, f))
}

/// Parse a file's worth of trees, one per `;`. Top-level bracketed blocks
/// between trees are skipped; posterior samples arrive this way, one tree
/// per line.
pub fn parse_forest(input: &str) -> Result<Vec<Tree>, TreeError> {
    let mut trees = Vec::new();
    let mut rest = input.trim_start();

    while !rest.is_empty() {
        if rest.starts_with('[') {
            let (after, _) = comment(rest).map_err(|f| positioned(input, f))?;
            rest = after.trim_start();
            continue;
        }
        let (after, tree) = read_tree(rest).map_err(|f| positioned(input, f))?;
        trees.push(tree);
        rest = after.trim_start();
    }

    Ok(trees)
}

/// Read Newick tree(s) from a file, `stdin` for standard input.
pub fn read_file(infile: &str) -> anyhow::Result<Vec<Tree>> {
    let mut text = String::new();
    intspan::reader(infile).read_to_string(&mut text)?;
    Ok(parse_forest(&text)?)
}

/// Serialize to a compact Newick string.
pub fn write(tree: &Tree) -> String {
    let mut out = String::new();
    if let Some(root) = tree.root() {
        emit(tree, root, &mut out);
    }
    out.push(';');
    out
}

fn emit(tree: &Tree, id: NodeId, out: &mut String) {
    let Some(node) = tree.node(id) else { return };

    if !node.children.is_empty() {
        out.push('(');
        for (i, &child) in node.children.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            emit(tree, child, out);
        }
        out.push(')');
    }

    if let Some(name) = &node.name {
        if name.chars().any(|c| c.is_whitespace() || "():;,[]".contains(c)) {
            let _ = write!(out, "'{}'", name);
        } else {
            out.push_str(name);
        }
    }
    if let Some(length) = node.length {
        let _ = write!(out, ":{}", length);
    }
    if let Some(annots) = &node.annots {
        if !annots.is_empty() {
            out.push_str("[&&NHX");
            for (k, v) in annots {
                let _ = write!(out, ":{}={}", k, v);
            }
            out.push(']');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_tree() {
        let tree = parse("((A:1,B:2):0.5,C:3)Root;").unwrap();
        let root = tree.root().unwrap();
        assert_eq!(tree.node(root).unwrap().name.as_deref(), Some("Root"));
        assert_eq!(tree.leaves().len(), 3);

        let a = tree.by_name("A").unwrap();
        assert_eq!(tree.node(a).unwrap().length, Some(1.0));
    }

    #[test]
    fn quoted_labels_and_scientific_lengths() {
        let tree = parse("('Homo sapiens':1.5e-2,Pan:0.02);").unwrap();
        assert!(tree.by_name("Homo sapiens").is_some());
    }

    #[test]
    fn nhx_annotations() {
        let tree = parse("(A[&&NHX:id=9606]:1,B:2);").unwrap();
        let a = tree.by_name("A").unwrap();
        assert_eq!(tree.node(a).unwrap().annot("id"), Some("9606"));
    }

    #[test]
    fn sampler_style_annotations() {
        let tree = parse("(A[&height=12.5,rate=0.3]:1,B:2);").unwrap();
        let a = tree.by_name("A").unwrap();
        assert_eq!(tree.node(a).unwrap().annot("height"), Some("12.5"));
        assert_eq!(tree.node(a).unwrap().annot("rate"), Some("0.3"));
    }

    #[test]
    fn forest() {
        let trees = parse_forest("(A,B);\n(C,D);\n(E,F);\n").unwrap();
        assert_eq!(trees.len(), 3);
    }

    #[test]
    fn forest_skips_header_blocks() {
        let trees = parse_forest("[ID: 42]\n(A,B);\n").unwrap();
        assert_eq!(trees.len(), 1);
    }

    #[test]
    fn error_carries_position() {
        let err = parse("((A:1,B:2):0.5,C:);").unwrap_err();
        match err {
            TreeError::Parse { line, column, .. } => {
                assert_eq!(line, 1);
                assert!(column > 1);
            }
            _ => panic!("expected a parse error"),
        }
    }

    #[test]
    fn round_trip() {
        let tree = parse("((A:1,B:2)ab:0.5,C:3)Root;").unwrap();
        assert_eq!(write(&tree), "((A:1,B:2)ab:0.5,C:3)Root;");
    }

    #[test]
    fn writer_quotes_spaced_labels() {
        let mut tree = Tree::new();
        let root = tree.add_node();
        tree.set_root(root);
        tree.node_mut(root).unwrap().set_name("Homo sapiens");
        assert_eq!(write(&tree), "'Homo sapiens';");
    }

    #[test]
    fn annotations_round_trip_after_length() {
        let tree = parse("(A[&&NHX:id=9606]:1,B:2);").unwrap();
        assert_eq!(write(&tree), "(A:1[&&NHX:id=9606],B:2);");
    }
}
