use clap::Parser;
use slide_deck::api::video::SlideExtractor;
use slide_deck::{CancelFlag, ExtractionConfig, PipelineEvent, SlidesResult};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

const BAR_LENGTH: usize = 50;

#[derive(Debug, Parser)]
#[command(
    name = "slide-deck",
    version,
    about = "Extract the distinct slides of a screen recording into a PDF"
)]
struct Cli {
    /// The video file path.
    infile: PathBuf,

    /// The .pdf output file path. Defaults to the video file name plus .pdf.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Read every N'th frame. Defaults to 24.
    #[arg(long)]
    nframe: Option<u64>,

    /// Stop once the read position passes this frame.
    #[arg(long)]
    lim: Option<u64>,

    /// Min diff needed for checking. Defaults to 0.90 (0=Nothing like, 1=Identical).
    #[arg(long)]
    diff: Option<f64>,

    /// Structural similarity threshold. Defaults to 0.90 (0=Nothing like, 1=Identical).
    #[arg(long)]
    ssim: Option<f64>,

    /// Always keep the first sampled frame as page one.
    #[arg(long)]
    include_first: bool,

    /// Fail on decode errors instead of treating them as end of stream.
    #[arg(long)]
    strict_decode: bool,

    /// JSON file with extraction settings; flags override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbose mode.
    #[arg(short)]
    v: bool,
}

impl Cli {
    fn extraction_config(&self) -> SlidesResult<ExtractionConfig> {
        let mut config = match &self.config {
            Some(path) => ExtractionConfig::from_json_file(path)?,
            None => ExtractionConfig::default(),
        };
        if let Some(n_frame) = self.nframe {
            config.n_frame = n_frame;
        }
        if self.lim.is_some() {
            config.frame_limit = self.lim;
        }
        if let Some(diff) = self.diff {
            config.diff_threshold = diff;
        }
        if let Some(ssim) = self.ssim {
            config.ssim_threshold = ssim;
        }
        config.include_first_frame |= self.include_first;
        config.strict_decode |= self.strict_decode;
        Ok(config)
    }
}

fn render_bar(label: &str, percent: u8) -> String {
    let filled = BAR_LENGTH * percent as usize / 100;
    format!(
        "\r{:<10} |{}{}| {:>3}% Complete",
        label,
        "█".repeat(filled),
        "-".repeat(BAR_LENGTH - filled),
        percent
    )
}

fn print_event(event: &PipelineEvent) {
    let mut stderr = std::io::stderr();
    match event {
        PipelineEvent::Progress { stage, percent } => {
            let _ = write!(stderr, "{}", render_bar(stage.label(), *percent));
            if *percent == 100 {
                let _ = writeln!(stderr);
            }
        }
        PipelineEvent::Done { pages } => {
            let _ = writeln!(stderr, "Done: {} pages.", pages);
        }
        PipelineEvent::Failed { reason } => {
            let _ = writeln!(stderr, "\nFailed: {}", reason);
        }
    }
    let _ = stderr.flush();
}

fn run(cli: &Cli) -> SlidesResult<()> {
    let config = cli.extraction_config()?;
    let extractor = SlideExtractor::create(config)?;

    let verbose = cli.v;
    let sink = move |event: PipelineEvent| {
        if verbose {
            print_event(&event);
        }
    };
    let report = extractor.convert(&cli.infile, cli.out.as_deref(), &sink, &CancelFlag::new())?;

    if let Some(output) = &report.output {
        println!(
            "{} pages ({} sampled, {} candidate pairs) written to {}",
            report.pages.len(),
            report.sampled_frames,
            report.candidate_pairs,
            output.display()
        );
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    slide_deck::init_logging(cli.v);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
