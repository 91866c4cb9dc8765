//! Graphviz dot output for the graph behind a node.

use std::{fmt::Display, io::Write, str::FromStr};

use log::debug;

use crate::{
    error::{Error, Result},
    graph::ScalarNode,
};

/// Layout direction of the rendered graph.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RankDir {
    #[default]
    LeftRight,
    TopBottom,
}

impl FromStr for RankDir {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "LR" => Ok(Self::LeftRight),
            "TB" => Ok(Self::TopBottom),
            _ => Err(Error::InvalidDirectionOption(s.to_string())),
        }
    }
}

impl Display for RankDir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LeftRight => write!(f, "LR"),
            Self::TopBottom => write!(f, "TB"),
        }
    }
}

pub struct DotBuilder<'a> {
    root: ScalarNode<'a>,
    direction: RankDir,
    show_values: bool,
    precision: usize,
}

impl<'a> ScalarNode<'a> {
    pub fn dot_builder(&self) -> DotBuilder<'a> {
        DotBuilder {
            root: *self,
            direction: RankDir::default(),
            show_values: true,
            precision: 4,
        }
    }
}

impl<'a> DotBuilder<'a> {
    pub fn direction(mut self, direction: RankDir) -> Self {
        self.direction = direction;
        self
    }

    /// Show value and gradient fields in node boxes.
    pub fn show_values(mut self, v: bool) -> Self {
        self.show_values = v;
        self
    }

    /// Number of decimals for values and gradients.
    pub fn precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    /// Write graphviz dot file to the given writer.
    pub fn dot(self, writer: &mut impl Write) -> Result<()> {
        let nodes = self.root.sequence()?;
        debug!("rendering {} nodes", nodes.len());
        writeln!(writer, "digraph G {{\nrankdir=\"{}\";", self.direction)?;
        for node in &nodes {
            let id = node.index();
            writeln!(
                writer,
                "a{id} [label=\"{}\", shape=record];",
                self.label(node)
            )?;
            if let Some(tag) = node.operation_tag() {
                writeln!(writer, "a{id}op [label=\"{tag}\"];")?;
                writeln!(writer, "a{id}op -> a{id};")?;
            }
        }
        for node in &nodes {
            for pred in node.predecessors() {
                writeln!(writer, "a{} -> a{}op;", pred.index(), node.index())?;
            }
        }
        writeln!(writer, "}}")?;
        Ok(())
    }

    fn label(&self, node: &ScalarNode) -> String {
        let prec = self.precision;
        let mut fields = vec![];
        if let Some(name) = node.name() {
            fields.push(escape(&name));
        }
        if self.show_values {
            fields.push(format!("value {:.prec$}", node.value()));
            fields.push(format!("gradient {:.prec$}", node.gradient()));
        }
        if fields.is_empty() {
            fields.push(format!("a{}", node.index()));
        }
        format!("{{ {} }}", fields.join(" | "))
    }
}

/// Escapes characters that are special in record labels.
fn escape(s: &str) -> String {
    let mut res = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '"' | '{' | '}' | '|' | '<' | '>' | '\\') {
            res.push('\\');
        }
        res.push(c);
    }
    res
}
