use anyhow::Result;
use clap::Parser;
use kgquiz::backend::wire::SearchHit;
use kgquiz::backend::{ExplorerBackend, HttpBackend, LocalBackend};
use kgquiz::generation::GenerationClient;
use kgquiz::quiz::{Question, QuizFormat};
use kgquiz::session::{ExpandOutcome, SessionController};
use kgquiz::config::MAX_TRAVERSAL_DEPTH;
use kgquiz::wikidata::WikidataClient;
use kgquiz::Config;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(name = "explore")]
#[command(about = "Explore a Wikidata entity graph and generate quiz questions from it")]
struct Args {
    /// Use a running kgquiz server instead of calling Wikidata directly
    #[arg(long)]
    server: Option<String>,

    /// Sitelink count from which a node is shown as a hub (0 disables)
    #[arg(long)]
    hub_threshold: Option<u64>,

    /// Generator model override
    #[arg(long)]
    model: Option<String>,
}

const HELP: &str = "\
Commands:
  search <term>          find candidate root entities
  pick <n>               load search result n as the root
  traverse <qid> [depth] load an entity as the root, 1 to 3 levels deep
  expand <qid>           fetch relations of a node in the background
  select <qid>           toggle a node in the selection
  show                   list the graph
  triples                list triples of the selection
  export <path>          write triples of the selection to a file
  generate [open|mcq]    generate questions from the selection
  models                 list generator models
  reset                  clear the session
  quit";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.explorer.log_level.as_str()),
    )
    .init();

    let hub_threshold = args.hub_threshold.unwrap_or_else(|| config.hub_threshold());

    match args.server.as_deref() {
        Some(url) => {
            let timeout = Duration::from_secs(config.generation.timeout_secs + 10);
            let backend = HttpBackend::new(url, timeout)?;
            log::info!("Using kgquiz server at {}", backend.base_url());
            run(Arc::new(SessionController::new(Arc::new(backend))), hub_threshold, args.model).await
        }
        None => {
            let wikidata = Arc::new(WikidataClient::new(config.wikidata.clone())?);
            let generator = Arc::new(GenerationClient::new(&config.generation)?);
            let backend = LocalBackend::new(wikidata, generator);
            run(Arc::new(SessionController::new(Arc::new(backend))), hub_threshold, args.model).await
        }
    }
}

async fn run<B: ExplorerBackend + 'static>(
    controller: Arc<SessionController<B>>,
    hub_threshold: u64,
    model: Option<String>,
) -> Result<()> {
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut hits: Vec<SearchHit> = Vec::new();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        match command {
            "" => {}
            "search" => match controller.search(rest).await {
                Ok(results) => {
                    if results.is_empty() {
                        println!("No results.");
                    }
                    for (i, hit) in results.iter().enumerate() {
                        println!("  {}. {} ({}) {}", i + 1, hit.label, hit.id, hit.description);
                    }
                    hits = results;
                }
                Err(e) => println!("Search failed: {}", e),
            },
            "pick" => {
                let Some(hit) = rest
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| hits.get(i))
                else {
                    println!("Pick a number from the last search.");
                    continue;
                };
                match controller.select_root(&hit.id, &hit.label).await {
                    Ok(Some(stats)) => println!(
                        "Loaded {}: {} nodes, {} edges",
                        hit.label, stats.nodes_added, stats.edges_added
                    ),
                    Ok(None) => println!("Root load superseded."),
                    Err(e) => println!("Could not load {}: {}", hit.id, e),
                }
            }
            "traverse" => {
                let mut parts = rest.split_whitespace();
                let Some(qid) = parts.next() else {
                    println!("Usage: traverse <qid> [depth]");
                    continue;
                };
                let depth = match parts.next().map(str::parse::<usize>) {
                    None => None,
                    Some(Ok(depth)) if (1..=MAX_TRAVERSAL_DEPTH).contains(&depth) => Some(depth),
                    Some(_) => {
                        println!("Depth must be between 1 and {}.", MAX_TRAVERSAL_DEPTH);
                        continue;
                    }
                };
                hits.clear();
                match controller.load_root(qid, qid, depth).await {
                    Ok(Some(stats)) => println!(
                        "Loaded {}: {} nodes, {} edges",
                        qid, stats.nodes_added, stats.edges_added
                    ),
                    Ok(None) => println!("Root load superseded."),
                    Err(e) => println!("Could not load {}: {}", qid, e),
                }
            }
            "expand" => spawn_expand(&controller, rest),
            "select" => match controller.toggle(rest).await {
                Ok(true) => println!("Selected {}", rest),
                Ok(false) => println!("Deselected {}", rest),
                Err(e) => println!("{}", e),
            },
            "show" => show(&controller, hub_threshold).await,
            "triples" => {
                let triples = controller.triples().await;
                if triples.is_empty() {
                    println!("Nothing selected.");
                }
                for triple in triples {
                    println!("  {}", triple);
                }
            }
            "export" => {
                if rest.is_empty() {
                    println!("Usage: export <path>");
                    continue;
                }
                match controller.export_triples(Path::new(rest)).await {
                    Ok(count) => println!("Wrote {} triples to {}", count, rest),
                    Err(e) => println!("Export failed: {}", e),
                }
            }
            "models" => match controller.backend().models().await {
                Ok(models) if models.is_empty() => println!("No models installed."),
                Ok(models) => {
                    for name in models {
                        println!("  {}", name);
                    }
                }
                Err(e) => println!("Could not list models: {}", e),
            },
            "generate" => {
                let format = match rest {
                    "" => QuizFormat::Open,
                    other => match other.parse::<QuizFormat>() {
                        Ok(format) => format,
                        Err(e) => {
                            println!("{}", e);
                            continue;
                        }
                    },
                };
                match controller.generate_questions(format, model.clone()).await {
                    Ok(questions) => print_questions(&questions),
                    Err(e) => println!("Generation failed: {}", e),
                }
            }
            "reset" => {
                controller.reset().await;
                hits.clear();
                println!("Session cleared.");
            }
            "quit" | "exit" => break,
            "help" => println!("{}", HELP),
            other => println!("Unknown command '{}'. Type 'help'.", other),
        }
    }

    Ok(())
}

/// Expand in the background so the prompt stays usable; the result is
/// printed when it arrives.
fn spawn_expand<B: ExplorerBackend + 'static>(controller: &Arc<SessionController<B>>, qid: &str) {
    if qid.is_empty() {
        println!("Usage: expand <qid>");
        return;
    }

    let controller = Arc::clone(controller);
    let qid = qid.to_string();
    println!("Expanding {}...", qid);
    tokio::spawn(async move {
        match controller.expand(&qid).await {
            Ok(ExpandOutcome::Merged(stats)) => println!(
                "\nExpanded {}: +{} nodes, +{} edges",
                qid, stats.nodes_added, stats.edges_added
            ),
            Ok(ExpandOutcome::AlreadyExpanded) => {
                println!("\n{} is already expanded or in flight.", qid)
            }
            Ok(ExpandOutcome::Stale) => println!("\nSession was reset; result for {} dropped.", qid),
            Err(e) => println!("\nExpansion of {} failed: {}", qid, e),
        }
    });
}

async fn show<B: ExplorerBackend>(controller: &SessionController<B>, hub_threshold: u64) {
    let graph = controller.render(hub_threshold).await;
    let stats = controller.stats().await;
    println!(
        "{} nodes, {} edges, {} selected, {} in flight",
        stats.nodes, stats.edges, stats.selected, stats.in_flight
    );

    for node in &graph.nodes {
        println!(
            "  {}{} {} ({}) depth {}{}{}",
            "  ".repeat(node.depth.min(4) as usize),
            if node.selected { "[x]" } else { "[ ]" },
            node.label,
            node.id,
            node.depth,
            if node.hub { " hub" } else { "" },
            if node.expanded { "" } else { " ..." },
        );
    }
}

fn print_questions(questions: &[Question]) {
    if questions.is_empty() {
        println!("The generator returned nothing.");
        return;
    }

    for question in questions {
        match question.tag {
            Some(tag) => println!("{} {}", tag.marker(), question.text),
            None => println!("{}", question.text),
        }
        for option in &question.options {
            println!(
                "    {}) {}{}",
                option.letter,
                option.text,
                if option.correct { "  <- answer" } else { "" }
            );
        }
    }
}
