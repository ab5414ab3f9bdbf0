mod all;
mod annotations;
mod camera;
mod camera_setup;
mod candidates;
mod chaining;
mod dbscan;
mod embedding;
mod encoder;
mod graph;
mod image;
mod metric;
mod parameters;
mod pipeline;
mod results;
mod track;
mod types;
mod util;
mod video;

use all::*;

#[macro_use] extern crate lazy_static;
use clap::Parser;

#[derive(Parser)]
struct Args {
  // Dataset root containing `train/`, `cam_timestamp/` and `cam_positions/`.
  #[clap(long)]
  root: PathBuf,
  // Sequence name, e.g. S02.
  #[clap(long)]
  seq: String,
  // Results are written to `<output>/<camera>/results.txt`.
  #[clap(long)]
  output: PathBuf,
  #[clap(long, default_value = "chain")]
  method: Method,
  // Command that starts an external encoder. It is given the model path as
  // its last argument. Without it a color histogram is used.
  #[clap(long)]
  encoder: Option<String>,
  #[clap(long, requires = "encoder")]
  model: Option<PathBuf>,
  #[clap(long, default_value = "8")]
  histogram_bins: usize,
  // Embeddings are stored here and reused on later runs.
  #[clap(long)]
  cache_dir: Option<PathBuf>,
  #[clap(short, long)]
  verbose: bool,
  #[clap(flatten)]
  parameters: ParameterSet,
}

fn handle_error(err: &anyhow::Error) {
  error!("{}", err);
  for (i, e) in err.chain().enumerate() {
    println!("  {}: {}", i + 1, e);
  }
}

fn main() {
  if let Err(err) = run() {
    handle_error(&err);
    std::process::exit(1);
  }
}

fn run() -> Result<()> {
  let args = Args::parse();
  env_logger::Builder::new()
    .filter_level(if args.verbose { LevelFilter::Debug } else { LevelFilter::Info })
    .format(util::format_log)
    .init();

  *PARAMETER_SET.lock().unwrap() = args.parameters.clone();
  let p = PARAMETER_SET.lock().unwrap().clone();
  debug!("{:?}", p);

  let mut encoder: Box<dyn Encoder> = match (&args.encoder, &args.model) {
    (Some(command), Some(model)) => Box::new(CommandEncoder::new(command, model)?),
    (Some(_), None) => bail!("--encoder needs --model."),
    _ => Box::new(HistogramEncoder::new(args.histogram_bins)?),
  };
  info!("Using encoder {}.", encoder.name());

  let sequence = Dataset::new(&args.root, &args.seq).load()?;
  let results = Pipeline::new(&mut *encoder, args.method, args.cache_dir.as_deref(), &p)
    .run(sequence)?;
  write_results(&results, &args.output)?;
  info!("Results written to {}.", args.output.display());
  Ok(())
}
