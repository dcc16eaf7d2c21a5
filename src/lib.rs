pub mod card;
pub mod catalog;
pub mod classify;
pub mod extract;
pub mod filter;
pub mod markup;
pub mod ownership;
pub mod reconcile;
pub mod store;

#[cfg(test)]
mod fixtures;

use catalog::{parse_catalog, wait_for_catalog, CatalogSource, FileSource, HttpSource, ReadyPolicy};
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use filter::{FacetKind, FilterState, OwnershipFilter};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fs;
use std::io::{self, BufRead, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use reconcile::{
  AppContext, CardView, CollectionStats, EventLog, FilterOutcome, RenderMode, ViewEvent, ViewObserver,
};
pub use store::{DisplaySettings, KeyValueStore, MemoryStore, SqliteStore};

const DB_FILE_NAME: &str = "cardlist.db";
const CACHE_DIR_NAME: &str = "cache";
const EXPORT_FILE_NAME: &str = "aikatsu_collection.csv";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StateDto {
  pub mode: RenderMode,
  pub filter: FilterState,
  pub stats: CollectionStats,
  pub display: DisplaySettings,
  pub cards: Vec<CardView>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipDto {
  pub image_path: String,
  pub owned: bool,
  pub stats: CollectionStats,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportResultDto {
  pub imported: usize,
  pub owned: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportDto {
  pub file_name: String,
  pub rows: usize,
  pub csv: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocateDto {
  pub index: Option<usize>,
  pub mode: RenderMode,
}

pub fn get_state(state: &AppContext) -> Result<StateDto, String> {
  Ok(StateDto {
    mode: state.mode(),
    filter: state.filter().clone(),
    stats: state.collection_stats(),
    display: state.display(),
    cards: state.card_views(),
  })
}

/// Toggles ownership by image path, or by position in the active rendering
/// when no path is given.
pub fn toggle_ownership(
  state: &mut AppContext,
  image_path: Option<String>,
  index: Option<usize>,
) -> Result<OwnershipDto, String> {
  let (image_path, owned) = match (image_path, index) {
    (Some(path), _) => {
      let owned = state.toggle_ownership(&path);
      (path, owned)
    }
    (None, Some(index)) => match state.mode() {
      RenderMode::Detail => state.toggle_detail_card(index)?,
      RenderMode::Compact => state.toggle_compact_card(index)?,
    },
    (None, None) => return Err("An image path or card index is required.".to_string()),
  };

  Ok(OwnershipDto {
    image_path,
    owned,
    stats: state.collection_stats(),
  })
}

pub fn set_search_term(state: &mut AppContext, term: String) -> Result<FilterOutcome, String> {
  Ok(state.set_search_term(&term))
}

pub fn toggle_filter(state: &mut AppContext, kind: FacetKind, value: String) -> Result<FilterOutcome, String> {
  state.toggle_filter(kind, &value)
}

pub fn set_ownership_filter(state: &mut AppContext, filter: String) -> Result<FilterOutcome, String> {
  let filter: OwnershipFilter = filter.parse()?;
  Ok(state.set_ownership_filter(filter))
}

pub fn clear_filters(state: &mut AppContext) -> Result<FilterOutcome, String> {
  Ok(state.clear_filters())
}

pub fn toggle_view_mode(state: &mut AppContext) -> Result<FilterOutcome, String> {
  Ok(state.toggle_mode())
}

pub fn import_owned_cards(state: &mut AppContext, payload: &[u8]) -> Result<ImportResultDto, String> {
  let imported = state.import_owned(payload)?;
  Ok(ImportResultDto {
    imported,
    owned: state.ownership().len(),
  })
}

pub fn export_owned_cards(state: &AppContext) -> Result<ExportDto, String> {
  let rows = state.export_rows();
  Ok(ExportDto {
    file_name: EXPORT_FILE_NAME.to_string(),
    rows: rows.len(),
    csv: ownership::render_export_csv(&rows),
  })
}

pub fn clear_owned_cards(state: &mut AppContext) -> Result<CollectionStats, String> {
  state.clear_owned();
  Ok(state.collection_stats())
}

pub fn locate_card(state: &mut AppContext, card_id: String) -> Result<LocateDto, String> {
  let index = state.locate_detail(&card_id);
  if index.is_none() {
    log::info!("card {} is not in the catalog", card_id);
  }
  Ok(LocateDto {
    index,
    mode: state.mode(),
  })
}

pub fn update_display_settings(
  state: &mut AppContext,
  card_size: Option<u32>,
  full_width: Option<bool>,
) -> Result<DisplaySettings, String> {
  if let Some(card_size) = card_size {
    state.set_card_size(card_size);
  }
  if let Some(full_width) = full_width {
    state.set_full_width(full_width);
  }
  Ok(state.display())
}

pub fn append_catalog_page(state: &mut AppContext, html: String) -> Result<FilterOutcome, String> {
  Ok(state.append_cards(parse_catalog(&html)))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct ToggleOwnershipArgs {
  image_path: Option<String>,
  index: Option<usize>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct SearchArgs {
  term: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToggleFilterArgs {
  kind: FacetKind,
  value: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OwnershipFilterArgs {
  filter: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportArgs {
  payload: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocateArgs {
  card_id: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct DisplayArgs {
  card_size: Option<u32>,
  full_width: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogPageArgs {
  html: String,
}

fn parse_args<T: DeserializeOwned>(cmd: &str, args: Value) -> Result<T, String> {
  let args = if args.is_null() { json!({}) } else { args };
  serde_json::from_value(args).map_err(|e| format!("Invalid arguments for {}: {}", cmd, e))
}

fn to_json<T: Serialize>(value: T) -> Result<Value, String> {
  serde_json::to_value(value).map_err(|e| e.to_string())
}

pub fn invoke(state: &mut AppContext, cmd: &str, args: Value) -> Result<Value, String> {
  log::debug!("invoke {}", cmd);
  match cmd {
    "get_state" => to_json(get_state(state)?),
    "toggle_ownership" => {
      let args: ToggleOwnershipArgs = parse_args(cmd, args)?;
      to_json(toggle_ownership(state, args.image_path, args.index)?)
    }
    "set_search_term" => {
      let args: SearchArgs = parse_args(cmd, args)?;
      to_json(set_search_term(state, args.term)?)
    }
    "toggle_filter" => {
      let args: ToggleFilterArgs = parse_args(cmd, args)?;
      to_json(toggle_filter(state, args.kind, args.value)?)
    }
    "set_ownership_filter" => {
      let args: OwnershipFilterArgs = parse_args(cmd, args)?;
      to_json(set_ownership_filter(state, args.filter)?)
    }
    "clear_filters" => to_json(clear_filters(state)?),
    "toggle_view_mode" => to_json(toggle_view_mode(state)?),
    "import_owned_cards" => {
      let args: ImportArgs = parse_args(cmd, args)?;
      to_json(import_owned_cards(state, args.payload.as_bytes())?)
    }
    "export_owned_cards" => to_json(export_owned_cards(state)?),
    "clear_owned_cards" => to_json(clear_owned_cards(state)?),
    "locate_card" => {
      let args: LocateArgs = parse_args(cmd, args)?;
      to_json(locate_card(state, args.card_id)?)
    }
    "update_display_settings" => {
      let args: DisplayArgs = parse_args(cmd, args)?;
      to_json(update_display_settings(state, args.card_size, args.full_width)?)
    }
    "append_catalog_page" => {
      let args: CatalogPageArgs = parse_args(cmd, args)?;
      to_json(append_catalog_page(state, args.html)?)
    }
    other => Err(format!("Unknown command '{}'.", other)),
  }
}

#[derive(Parser, Debug)]
#[command(name = "cardlist", about = "Collection tracker for the card list catalog", version)]
struct Cli {
  #[command(subcommand)]
  command: Command,

  /// Directory holding the settings database and page cache
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Catalog page to load: a saved HTML file or an http(s) URL. Repeatable.
  #[arg(long = "source", global = true)]
  sources: Vec<String>,

  /// Ignore cached catalog pages
  #[arg(long, global = true)]
  refresh: bool,

  /// Attempts made per source before giving up on an empty catalog
  #[arg(long, global = true, default_value_t = 20)]
  ready_attempts: u32,

  #[arg(short, long, global = true)]
  verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List catalog cards with their ownership
  List {
    #[arg(long)]
    search: Option<String>,
    #[arg(long = "type")]
    types: Vec<String>,
    #[arg(long = "category")]
    categories: Vec<String>,
    #[arg(long = "rarity")]
    rarities: Vec<String>,
    #[arg(long, default_value = "all")]
    ownership: String,
    /// Use the compact rendering
    #[arg(long)]
    compact: bool,
    #[arg(long)]
    json: bool,
  },
  /// Flip ownership of one card image
  Toggle {
    image_path: Option<String>,
    #[arg(long)]
    index: Option<usize>,
  },
  /// Merge owned cards from an export file ("-" reads stdin)
  Import { file: PathBuf },
  /// Write owned cards as CSV
  Export {
    #[arg(long)]
    output: Option<PathBuf>,
  },
  /// Forget every owned card
  Clear,
  /// Show or change display settings
  Settings {
    #[arg(long)]
    card_size: Option<u32>,
    #[arg(long)]
    full_width: Option<bool>,
  },
  /// Find a card by id in the detail rendering
  Locate { card_id: String },
  /// JSON-lines command bridge on stdin/stdout
  Serve,
}

struct StdoutEvents;

impl ViewObserver for StdoutEvents {
  fn notify(&mut self, event: &ViewEvent) {
    match serde_json::to_string(event) {
      Ok(line) => println!("{}", line),
      Err(error) => log::warn!("could not encode view event: {}", error),
    }
  }
}

#[derive(Deserialize)]
struct BridgeRequest {
  #[serde(default)]
  id: Value,
  cmd: String,
  #[serde(default)]
  args: Value,
}

fn serve(state: &mut AppContext) -> Result<(), String> {
  state.subscribe(Box::new(StdoutEvents));
  log::info!("bridge ready");

  for line in io::stdin().lock().lines() {
    let line = line.map_err(|e| e.to_string())?;
    if line.trim().is_empty() {
      continue;
    }
    let reply = match serde_json::from_str::<BridgeRequest>(&line) {
      Ok(request) => match invoke(state, &request.cmd, request.args) {
        Ok(result) => json!({ "id": request.id, "ok": true, "result": result }),
        Err(error) => {
          log::warn!("{} failed: {}", request.cmd, error);
          json!({ "id": request.id, "ok": false, "error": error })
        }
      },
      Err(error) => json!({ "ok": false, "error": format!("Malformed request: {}", error) }),
    };
    println!("{}", reply);
  }
  Ok(())
}

fn default_data_dir() -> Result<PathBuf, String> {
  ProjectDirs::from("", "", "cardlist-enhancer")
    .map(|dirs| dirs.data_dir().to_path_buf())
    .ok_or_else(|| "Could not resolve an app data directory; pass --data-dir.".to_string())
}

fn is_remote(raw: &str) -> bool {
  raw.starts_with("http://") || raw.starts_with("https://")
}

fn catalog_source(raw: &str, cache_dir: &Path, refresh: bool) -> Box<dyn CatalogSource> {
  if is_remote(raw) {
    Box::new(HttpSource::new(raw, cache_dir, refresh))
  } else {
    Box::new(FileSource::new(raw))
  }
}

fn load_catalog(state: &mut AppContext, cli: &Cli, data_dir: &Path) -> Result<(), String> {
  let cache_dir = data_dir.join(CACHE_DIR_NAME);
  let policy = ReadyPolicy {
    max_attempts: cli.ready_attempts.max(1),
    ..ReadyPolicy::default()
  };
  for raw in &cli.sources {
    let source = catalog_source(raw, &cache_dir, cli.refresh);
    // Saved pages never change between polls.
    let policy = if is_remote(raw) {
      policy
    } else {
      ReadyPolicy {
        interval: Duration::ZERO,
        max_attempts: 1,
      }
    };
    state.append_cards(wait_for_catalog(source.as_ref(), policy)?);
  }
  Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
  let text = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
  println!("{}", text);
  Ok(())
}

fn print_cards(views: &[CardView]) {
  for view in views.iter().filter(|view| view.visible) {
    println!(
      "[{}] {:<12} {:<8} {:<12} {:<3} {}",
      if view.owned { "x" } else { " " },
      view.id.as_deref().unwrap_or("-"),
      view.card_type.map(|card_type| card_type.as_str()).unwrap_or("-"),
      view.category.as_str(),
      view.rarity.label(),
      view.name,
    );
  }
}

fn read_import_payload(file: &Path) -> Result<Vec<u8>, String> {
  if file == Path::new("-") {
    let mut payload = Vec::new();
    io::stdin().read_to_end(&mut payload).map_err(|e| e.to_string())?;
    return Ok(payload);
  }
  fs::read(file).map_err(|e| format!("{}: {}", file.display(), e))
}

fn execute(cli: Cli) -> Result<(), String> {
  let data_dir = match &cli.data_dir {
    Some(dir) => dir.clone(),
    None => default_data_dir()?,
  };
  let store = SqliteStore::open(data_dir.join(DB_FILE_NAME))?;
  let mut state = AppContext::new(Box::new(store));
  load_catalog(&mut state, &cli, &data_dir)?;

  match cli.command {
    Command::List {
      search,
      types,
      categories,
      rarities,
      ownership,
      compact,
      json,
    } => {
      if compact {
        toggle_view_mode(&mut state)?;
      }
      if let Some(term) = search {
        set_search_term(&mut state, term)?;
      }
      let facets = types
        .into_iter()
        .map(|value| (FacetKind::Type, value))
        .chain(categories.into_iter().map(|value| (FacetKind::Category, value)))
        .chain(rarities.into_iter().map(|value| (FacetKind::Rarity, value)));
      for (kind, value) in facets {
        toggle_filter(&mut state, kind, value)?;
      }
      let outcome = set_ownership_filter(&mut state, ownership)?;

      if json {
        print_json(&get_state(&state)?)
      } else {
        print_cards(&state.card_views());
        let stats = state.collection_stats();
        println!(
          "{} of {} shown, {} owned",
          outcome.visible, stats.displayed, stats.owned
        );
        Ok(())
      }
    }
    Command::Toggle { image_path, index } => print_json(&toggle_ownership(&mut state, image_path, index)?),
    Command::Import { file } => {
      let payload = read_import_payload(&file)?;
      print_json(&import_owned_cards(&mut state, &payload)?)
    }
    Command::Export { output } => {
      let export = export_owned_cards(&state)?;
      match output {
        Some(path) => {
          fs::write(&path, &export.csv).map_err(|e| e.to_string())?;
          log::info!("wrote {} rows to {}", export.rows, path.display());
          Ok(())
        }
        None => {
          println!("{}", export.csv);
          Ok(())
        }
      }
    }
    Command::Clear => print_json(&clear_owned_cards(&mut state)?),
    Command::Settings { card_size, full_width } => {
      print_json(&update_display_settings(&mut state, card_size, full_width)?)
    }
    Command::Locate { card_id } => print_json(&locate_card(&mut state, card_id)?),
    Command::Serve => serve(&mut state),
  }
}

fn init_logging(verbose: bool) {
  let default_level = if cfg!(debug_assertions) { "info" } else { "warn" };
  let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level));
  if verbose {
    builder.filter_level(log::LevelFilter::Debug);
  }
  builder.init();
}

pub fn run() {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  if let Err(error) = execute(cli) {
    log::error!("{}", error);
    std::process::exit(1);
  }
}
