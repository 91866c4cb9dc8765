//! Builds a single neuron over two inputs, backpropagates through it and prints
//! the graph in dot format.
//!
//! ```bash
//! microdiff | dot -Tsvg > out.svg
//! microdiff --direction TB --seed 7 --output out.dot
//! ```

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
    process::ExitCode,
};

use clap::Parser;
use log::{error, info};
use microdiff::{
    nn::{Activation, Module, Neuron},
    Graph, RankDir, Result,
};
use rand::{rngs::StdRng, SeedableRng};

#[derive(Parser, Debug)]
#[command(name = "microdiff")]
#[command(version)]
#[command(about = "Render the backpropagated graph of a single neuron")]
struct Cli {
    /// Layout direction, LR or TB
    #[arg(short, long, default_value = "LR")]
    direction: RankDir,

    /// Seed for the weight initialization
    #[arg(short, long, default_value_t = 1337)]
    seed: u64,

    /// Write the dot file here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Hide values and gradients in the boxes
    #[arg(long)]
    hide_values: bool,
}

fn run(cli: &Cli) -> Result<()> {
    let graph = Graph::new();
    let mut rng = StdRng::seed_from_u64(cli.seed);
    let neuron = Neuron::new(&graph, 2, Activation::Linear, &mut rng);
    let x = [graph.term("x1", 1.), graph.term("x2", -2.)];

    let y = neuron.forward(&x)?;
    y.backward_propagate()?;
    info!("y = {}", y.value());
    for (i, param) in neuron.parameters().iter().enumerate() {
        info!("param {i}: value {} gradient {}", param.value(), param.gradient());
    }

    let builder = y
        .dot_builder()
        .direction(cli.direction)
        .show_values(!cli.hide_values);
    match &cli.output {
        Some(path) => {
            let mut file = BufWriter::new(File::create(path)?);
            builder.dot(&mut file)?;
            file.flush()?;
            Ok(())
        }
        None => builder.dot(&mut std::io::stdout()),
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
