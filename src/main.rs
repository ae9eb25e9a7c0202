//! Command-line front end for the Kotonoha workshop.
//!
//! Responsibilities here are intentionally minimal:
//! - Parse command-line arguments.
//! - Load user configuration from `conf/config.toml`.
//! - Open the library and dispatch to the workshop or the reader.

use anyhow::{Context, Result, anyhow, bail};
use kotonoha::anchor::AnchorIndex;
use kotonoha::cancellation::CancellationToken;
use kotonoha::config::{AppConfig, load_config};
use kotonoha::generation::GeminiClient;
use kotonoha::layout::Block;
use kotonoha::model::{BookPatch, Character};
use kotonoha::reader::{ReaderCommand, ReaderSession, ReaderSnapshot};
use kotonoha::storage::{FileStore, Library};
use kotonoha::structure;
use kotonoha::workshop::{self, CLASSIC_WORKS, Workshop};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

const API_KEY_ENV: &str = "GEMINI_API_KEY";

const USAGE: &str = "Usage: kotonoha <command> [args]

Library:
  list                          list books, newest first
  new                           create an empty book
  dice                          start a 三題噺 with three random topics
  delete <id>                   delete a book
  export <id> [file]            write the manuscript as plain text
  backup [file]                 export the whole library as JSON
  restore <file>                replace the library from a backup
  set-key <key> | clear-key     store or forget the API key
  clear-all                     remove every stored value

Reading:
  show <id>                     print the manuscript
  render <id>                   print the vertical presentation as JSON
  toc <id>                      list chapters and table-of-contents links
  read <id> [page|anchor]       print one page of the reading view
  stamp <id>                    drop a random stamp on the book
  cast <id> <name> [desc]       add a character to the book's cast
  world <id> <text>             set the book's world notes

Workshop:
  write <id> <genre[:detail]> <prompt>
  continue <id> [direction]
  illustrate <id> <prompt>
  cover <id>
  background
  narrate <id> <out.wav>
  review <id>
  refine <words>
  chat <id> <message>
  fan-letter <id>
  classic [title]               import a classic, or list the available ones";

fn main() {
    let reload_handle = init_tracing();
    if let Err(err) = run(&reload_handle) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

fn run(reload_handle: &ReloadHandle) -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let config = load_config(Path::new("conf/config.toml"));
    set_log_level(reload_handle, config.log_level.as_filter_str());
    info!(
        data_dir = %config.data_dir,
        level = %config.log_level,
        "Starting Kotonoha"
    );

    let Some((command, rest)) = args.split_first() else {
        println!("{USAGE}");
        return Ok(());
    };
    let mut library = Library::open(FileStore::new(&config.data_dir));

    match command.as_str() {
        "list" => {
            for book in library.books() {
                println!(
                    "{}\t{}\t{}\t{}",
                    book.id,
                    book.title,
                    book.genre.as_deref().unwrap_or("-"),
                    book.content.chars().count()
                );
            }
        }
        "new" => {
            let book = library.create()?;
            println!("{}", book.id);
        }
        "dice" => {
            let book = workshop::start_three_topic_story(&mut library, &mut rand::thread_rng())?;
            println!("{}\n{}", book.id, book.content.trim_end());
        }
        "delete" => {
            let removed = library.delete(arg(rest, 0, "book id")?)?;
            println!("deleted {}", removed.title);
        }
        "export" => {
            let id = arg(rest, 0, "book id")?;
            let text = library.export_text(id)?;
            write_or_print(rest.get(1), &text)?;
        }
        "backup" => {
            let json = library.export_backup()?;
            write_or_print(rest.first(), &json)?;
        }
        "restore" => {
            let path = PathBuf::from(arg(rest, 0, "backup file")?);
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let count = library.import_backup(&raw)?;
            println!("restored {count} books");
        }
        "set-key" => library.set_api_key(arg(rest, 0, "API key")?)?,
        "clear-key" => library.clear_api_key()?,
        "clear-all" => library.clear_all()?,
        "show" => {
            let book = library.require(arg(rest, 0, "book id")?)?;
            println!("{}", book.content);
        }
        "render" => {
            let book = library.require(arg(rest, 0, "book id")?)?;
            let presentation = kotonoha::layout::render_book(book, &config.layout_options());
            println!("{}", serde_json::to_string_pretty(&presentation)?);
        }
        "toc" => {
            let book = library.require(arg(rest, 0, "book id")?)?;
            print_toc(&structure::parse_book(book));
        }
        "read" => {
            let book = library.require(arg(rest, 0, "book id")?)?.clone();
            let mut session = ReaderSession::open(book, config.layout_options());
            let command = match rest.get(1) {
                Some(target) => match target.parse::<usize>() {
                    Ok(page) => ReaderCommand::SetPage {
                        page: page.saturating_sub(1),
                    },
                    Err(_) => ReaderCommand::FollowLink {
                        anchor_id: target.clone(),
                    },
                },
                None => ReaderCommand::GetSnapshot,
            };
            print_page(&session.apply_command(command).snapshot);
        }
        "stamp" => {
            let book =
                workshop::random_stamp(&mut library, arg(rest, 0, "book id")?, &mut rand::thread_rng())?;
            if let Some(stamp) = book.stamps.last() {
                println!("{} at {}, {}", stamp.text, stamp.x.css(), stamp.y.css());
            }
        }
        "cast" => {
            let id = arg(rest, 0, "book id")?;
            let mut characters = library.require(id)?.characters.clone();
            characters.push(Character {
                name: arg(rest, 1, "character name")?.to_string(),
                desc: rest.get(2..).map(|words| words.join(" ")).unwrap_or_default(),
            });
            let book = library.update(
                id,
                BookPatch {
                    characters: Some(characters),
                    ..BookPatch::default()
                },
            )?;
            for character in &book.characters {
                println!("{}\t{}", character.name, character.desc);
            }
        }
        "world" => {
            let id = arg(rest, 0, "book id")?;
            let notes = rest.get(1..).map(|words| words.join(" ")).unwrap_or_default();
            library.update(
                id,
                BookPatch {
                    world_settings: Some(notes),
                    ..BookPatch::default()
                },
            )?;
        }
        "help" | "--help" | "-h" => println!("{USAGE}"),
        "classic" if rest.is_empty() => {
            for work in CLASSIC_WORKS {
                println!("{}\t{}", work.title, work.author);
            }
        }
        other => run_generation(other, rest, &config, &mut library)?,
    }
    Ok(())
}

fn run_generation(
    command: &str,
    rest: &[String],
    config: &AppConfig,
    library: &mut Library<FileStore>,
) -> Result<()> {
    const GENERATION_COMMANDS: [&str; 11] = [
        "write",
        "continue",
        "illustrate",
        "cover",
        "background",
        "narrate",
        "review",
        "refine",
        "chat",
        "fan-letter",
        "classic",
    ];
    if !GENERATION_COMMANDS.contains(&command) {
        bail!("Unknown command: {command}\n\n{USAGE}");
    }

    let api_key = match library.api_key()? {
        Some(key) => key,
        None => env::var(API_KEY_ENV)
            .map_err(|_| anyhow!("No API key; run `kotonoha set-key <key>` or set {API_KEY_ENV}"))?,
    };
    let cancel = CancellationToken::new();
    install_interrupt_handler(&cancel);
    let client = GeminiClient::new(api_key, config.generation_settings(), cancel)?;
    let mut workshop = Workshop::new(library, &client, config.generation_settings());

    match command {
        "write" => {
            let id = arg(rest, 0, "book id")?;
            let genre = arg(rest, 1, "genre")?;
            let (main, detail) = genre.split_once(':').unwrap_or((genre, ""));
            let prompt = rest.get(2..).map(|words| words.join(" ")).unwrap_or_default();
            let book = workshop.write_opening(id, &workshop::genre_text(main, detail), &prompt)?;
            println!("{}\n\n{}", book.title, book.content);
        }
        "continue" => {
            let id = arg(rest, 0, "book id")?;
            let direction = rest.get(1..).map(|words| words.join(" ")).unwrap_or_default();
            let book = workshop.continue_story(id, &direction)?;
            println!("{}", book.content);
        }
        "illustrate" => {
            let id = arg(rest, 0, "book id")?;
            let prompt = rest.get(1..).map(|words| words.join(" ")).unwrap_or_default();
            let book = workshop.add_illustration(id, &prompt)?;
            if let Some(ill) = book.illustrations.last() {
                println!("added illustration {}", ill.id);
            }
        }
        "cover" => {
            workshop.generate_cover(arg(rest, 0, "book id")?)?;
            println!("cover updated");
        }
        "background" => {
            let url = workshop.generate_background()?;
            println!("background stored ({} bytes)", url.len());
        }
        "narrate" => {
            let narration = workshop.narrate(arg(rest, 0, "book id")?)?;
            let out = PathBuf::from(arg(rest, 1, "output .wav path")?);
            fs::write(&out, narration.to_wav()?)
                .with_context(|| format!("Failed to write {}", out.display()))?;
            println!("wrote {}", out.display());
        }
        "review" => println!("{}", workshop.review(arg(rest, 0, "book id")?)?),
        "refine" => println!("{}", workshop.refine_wording(&rest.join(" "))?),
        "chat" => {
            let id = arg(rest, 0, "book id")?;
            let message = rest.get(1..).map(|words| words.join(" ")).unwrap_or_default();
            let (_, reply) = workshop.chat(id, &message)?;
            println!("{reply}");
        }
        "fan-letter" => println!("{}", workshop.fan_letter(arg(rest, 0, "book id")?)?),
        "classic" => {
            let book = workshop.import_classic(&rest.join(" "))?;
            println!("{}\t{}", book.id, book.title);
        }
        _ => bail!("Unknown command: {command}"),
    }
    Ok(())
}

fn arg<'a>(rest: &'a [String], idx: usize, what: &str) -> Result<&'a str> {
    rest.get(idx)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("Missing {what}\n\n{USAGE}"))
}

fn write_or_print(path: Option<&String>, text: &str) -> Result<()> {
    match path {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("Failed to write {path}"))?;
            info!(%path, bytes = text.len(), "Wrote export");
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn print_toc(document: &structure::ParsedDocument) {
    let anchors = AnchorIndex::build(document);
    for entry in anchors.entries() {
        println!("{}\t{}\tline {}", entry.anchor_id, entry.text, entry.line + 1);
    }
    for (text, target) in document.toc_entries() {
        let status = if anchors.locate(target).is_some() {
            "ok"
        } else {
            "missing"
        };
        println!("・{text}\t-> {target}\t{status}");
    }
}

fn print_page(snapshot: &ReaderSnapshot) {
    println!(
        "page {}/{}{}",
        snapshot.current_page + 1,
        snapshot.total_pages,
        snapshot
            .chapter_anchor_id
            .as_deref()
            .map(|anchor| format!("  [{anchor}]"))
            .unwrap_or_default()
    );
    if let Some(notice) = &snapshot.presentation.empty_notice {
        println!("{notice}");
    }
    let blocks = &snapshot.presentation.blocks[snapshot.first_block..snapshot.end_block];
    for block in blocks {
        match block {
            Block::Title { text } => println!("《{text}》"),
            Block::Paragraph {
                text, indent_em, ..
            } => println!("{}{text}", "\u{3000}".repeat(indent_em.round().max(0.0) as usize)),
            Block::Heading { text, .. } => println!("■ {text}"),
            Block::SectionTitle { label, .. } => println!("{label}"),
            Block::TocLink { text, target } => println!("  {text} -> {}", target.anchor_id),
            Block::Figure {
                illustration_id,
                size,
                ..
            } => match size {
                Some(size) => println!(
                    "[figure {illustration_id} {:.0}x{:.0}]",
                    size.width, size.height
                ),
                None => println!("[figure {illustration_id}]"),
            },
            Block::Placeholder { label, .. } => println!("{label}"),
            Block::Spacer { .. } => println!(),
        }
    }
}

fn install_interrupt_handler(cancel: &CancellationToken) {
    let cancel = cancel.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        warn!("Interrupt received; abandoning in-flight request");
        cancel.cancel();
    }) {
        warn!("Failed to install Ctrl-C handler: {err}");
    }
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_writer(std::io::stderr)
                .with_filter(filter_layer),
        )
        .init();
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(err) = handle.modify(|filter| *filter = parsed.clone()) {
        warn!(%level, "Failed to update log level from config: {err}");
    } else {
        info!(%level, "Applied log level from config");
    }
}
