use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::{ArgAction, CommandFactory, Parser, Subcommand};

use match_assembler::config::{
    config_dir, find_default_config, init_default_config, load_config, AppConfig,
    DEFAULT_CONFIG_FILENAME,
};
use match_assembler::progress::ConsoleProgress;
use match_assembler::registry::EngineRegistry;
use match_assembler::request::{assemble_all, read_request, write_report};
use match_assembler::terminology::{
    render_search_report, search_terms, GlossaryEngine, LocalGlossary, TerminologyLookup,
};
use match_assembler::MatchAssembler;

#[derive(Parser, Debug)]
#[command(name = "tm-assemble")]
#[command(about = "Assemble translation candidates from fuzzy TM matches and glossaries", long_about = None)]
struct Args {
    /// Generate a default config file, then exit
    #[arg(long)]
    init_config: bool,

    /// Directory to write the config file to (default: current directory)
    #[arg(long, value_name = "DIR")]
    init_config_dir: Option<PathBuf>,

    /// Overwrite an existing config file when used with --init-config
    #[arg(long)]
    force: bool,

    /// Config file path (default: $TM_ASSEMBLE_CONFIG, or tm-assemble.toml searched upwards)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// No progress output and no logging
    #[arg(short, long, global = true)]
    quiet: bool,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assemble every segment of a JSON request file
    Assemble {
        /// Request JSON: {srcLang, tgtLang, glossary?, segments: [{id, text, matches}]}
        #[arg(long, value_name = "JSON")]
        request: PathBuf,

        /// Glossary id from config (overrides the request's glossary)
        #[arg(long)]
        glossary: Option<String>,

        /// Output JSON (default: <request_stem>.assembled.json)
        #[arg(short, long, value_name = "JSON")]
        output: Option<PathBuf>,

        /// Worker threads (default: one per core)
        #[arg(long)]
        threads: Option<usize>,

        /// Fixed creationdate for every synthesized match (e.g. 20260101T000000Z)
        #[arg(long)]
        creation_date: Option<String>,
    },

    /// Look a term up in a configured glossary
    Search {
        #[arg(long)]
        glossary: String,
        #[arg(long)]
        text: String,
        #[arg(long = "src")]
        src_lang: String,
        #[arg(long = "tgt")]
        tgt_lang: String,
        /// Minimum similarity 0-100
        #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u8).range(0..=100))]
        similarity: u8,
        #[arg(long)]
        ignore_case: bool,
    },

    /// Add a term to a local glossary file
    AddTerm {
        #[arg(long)]
        glossary: String,
        #[arg(long)]
        source: String,
        #[arg(long)]
        target: String,
        #[arg(long = "src")]
        src_lang: String,
        #[arg(long = "tgt")]
        tgt_lang: String,
    },

    /// List configured glossaries
    Glossaries,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.quiet, args.verbose);
    let progress = ConsoleProgress::new(!args.quiet);

    if args.init_config {
        let dir = args
            .init_config_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let cfg_path = dir.join(DEFAULT_CONFIG_FILENAME);
        init_default_config(&cfg_path, args.force).context("init default config")?;
        eprintln!("Wrote config: {}", cfg_path.display());
        return Ok(());
    }

    let Some(command) = args.command else {
        let mut cmd = Args::command();
        cmd.print_help().context("print help")?;
        eprintln!(
            "\n\nTIPS:\n  - tm-assemble --init-config writes a starter tm-assemble.toml.\n  - Default config search: tm-assemble.toml (upwards), or set TM_ASSEMBLE_CONFIG.\n"
        );
        return Ok(());
    };

    let workdir = match &command {
        Command::Assemble { request, .. } => request.parent().map(Path::to_path_buf),
        _ => None,
    };
    let (cfg, base_dir) = resolve_config(args.config.as_deref(), workdir.as_deref())?;
    let mut registry = EngineRegistry::from_config(&cfg, base_dir);

    match command {
        Command::Assemble {
            request,
            glossary,
            output,
            threads,
            creation_date,
        } => {
            let req = read_request(&request)?;
            let glossary_id = glossary.or_else(|| req.glossary.clone());
            let engine: Arc<GlossaryEngine> = match glossary_id.as_deref() {
                Some(id) => registry.open(id)?,
                None => {
                    log::info!("no glossary selected; assembling from numbers only");
                    Arc::new(GlossaryEngine::from(LocalGlossary::new("none")))
                }
            };

            let mut assembler = MatchAssembler::new(cfg.assembler_settings());
            if let Some(date) = creation_date {
                assembler = assembler.with_creation_date(date);
            }

            progress.info(format!(
                "assembling {} segment(s) {} -> {} with glossary {}",
                req.segments.len(),
                req.src_lang,
                req.tgt_lang,
                engine.name()
            ));
            let report = match threads {
                Some(n) => rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .context("build worker pool")?
                    .install(|| assemble_all(&assembler, &req, engine.as_ref(), &progress)),
                None => assemble_all(&assembler, &req, engine.as_ref(), &progress),
            };

            let output = output.unwrap_or_else(|| default_output_for(&request));
            write_report(&output, &report)?;
            let tally = progress.tally();
            progress.info(format!(
                "{} of {} segment(s) assembled from {} candidate(s), {} failed, wrote {}",
                report.assembled(),
                tally.total,
                tally.candidates,
                report.failures(),
                output.display()
            ));
            registry.close_all();
        }

        Command::Search {
            glossary,
            text,
            src_lang,
            tgt_lang,
            similarity,
            ignore_case,
        } => {
            let engine = registry.open(&glossary)?;
            let hits = search_terms(
                engine.as_ref(),
                &text,
                &src_lang,
                &tgt_lang,
                similarity,
                !ignore_case,
            )
            .with_context(|| format!("search glossary {glossary}"))?;
            print!("{}", render_search_report(&hits, &src_lang, &tgt_lang));
            registry.close(&glossary)?;
        }

        Command::AddTerm {
            glossary,
            source,
            target,
            src_lang,
            tgt_lang,
        } => {
            let engine = registry.open(&glossary)?;
            let local = engine
                .as_local()?
                .ok_or_else(|| anyhow!("glossary {glossary} is not a local glossary"))?;
            local
                .add_term(&source, &target, &src_lang, &tgt_lang)
                .with_context(|| format!("add term to {glossary}"))?;
            progress.info(format!("added {source:?} -> {target:?} to {glossary}"));
            registry.close(&glossary)?;
        }

        Command::Glossaries => {
            for g in registry.list() {
                println!("{}\t{}\t{}", g.id, g.kind, g.name);
            }
        }
    }
    Ok(())
}

fn init_logging(quiet: bool, verbose: u8) {
    if quiet {
        return;
    }
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn resolve_config(
    explicit: Option<&Path>,
    workdir: Option<&Path>,
) -> anyhow::Result<(AppConfig, PathBuf)> {
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => find_default_config(workdir, DEFAULT_CONFIG_FILENAME),
    };
    match path {
        Some(p) => {
            log::info!("config: {}", p.display());
            let cfg = load_config(&p)?;
            Ok((cfg, config_dir(&p)))
        }
        None => {
            log::info!("no config file found; using defaults");
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            Ok((AppConfig::default(), cwd))
        }
    }
}

fn default_output_for(request: &Path) -> PathBuf {
    let stem = request
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("request")
        .to_string();
    request.with_file_name(format!("{stem}.assembled.json"))
}
