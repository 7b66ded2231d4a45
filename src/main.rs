// gemini-mcp - Gemini tools over MCP that learn how you like your answers
//
// With no arguments this runs the stdio server. The other commands poke at
// the stored preferences without starting it.

use gemini_mcp_lib::{
    data::StorageStats,
    gemini::{GeminiClient, ModelService},
    logging,
    mcp::{run_stdio, McpServer},
    tools::ToolRegistry,
    Config, GeminiError, IntelligenceSystem, PreferencesStore, Result,
};
use anyhow::Context;
use std::env;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let config = Config::from_env().context("failed to read configuration")?;
    logging::init(config.debug);

    let command = args.get(1).map(String::as_str).unwrap_or("serve");

    dispatch(command, &args, &config)
        .await
        .with_context(|| format!("gemini-mcp {} failed", command))
}

async fn dispatch(command: &str, args: &[String], config: &Config) -> Result<()> {
    match command {
        "serve" => handle_serve(config).await,
        "inspect" => handle_inspect(config).await,
        "stats" => handle_stats(config).await,
        "export" => handle_export(config, args.get(2..).unwrap_or_default()).await,
        "import" => handle_import(config, args.get(2..).unwrap_or_default()).await,
        "clear" => handle_clear(config).await,
        "migrate" => handle_migrate(config).await,
        "version" | "-v" | "--version" => {
            println!("gemini-mcp v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "-h" | "--help" => {
            print_usage();
            Ok(())
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            Ok(())
        }
    }
}

async fn handle_serve(config: &Config) -> Result<()> {
    let api_key = config.require_api_key()?;

    let store = Arc::new(PreferencesStore::new(config.store_config())?);
    let intelligence = Arc::new(IntelligenceSystem::new(store));
    // Runs without learning if this fails
    intelligence.initialize().await;

    let model: Arc<dyn ModelService> = Arc::new(GeminiClient::with_base(api_key, &config.api_base)?);
    let registry = ToolRegistry::with_defaults(config, Arc::clone(&intelligence), model)?;

    info!(
        tools = registry.len(),
        data_dir = %config.data_dir.display(),
        "Gemini MCP server running on stdio"
    );

    let server = McpServer::new(registry, intelligence);
    run_stdio(&server).await
}

async fn open_store(config: &Config) -> Result<PreferencesStore> {
    let store = PreferencesStore::new(config.store_config())?;
    store.initialize().await?;
    Ok(store)
}

async fn handle_inspect(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let doc = store.get_preferences().await;

    println!("\nStored Preferences");
    println!("{}", "=".repeat(60));

    if doc.patterns.is_empty() {
        println!("\nNo patterns learned yet.");
    }

    for (context, history) in &doc.patterns {
        println!("\n{} ({} patterns)", context, history.len());
        for pattern in history.iter().rev().take(3) {
            println!(
                "  {}  [{}] {}",
                pattern.timestamp.format("%Y-%m-%d %H:%M"),
                pattern.tool.as_deref().unwrap_or("-"),
                truncate(&pattern.original, 60)
            );
        }
    }

    println!("\nMigration:");
    match (doc.migration_info.migrated, doc.migration_info.migration_date) {
        (true, Some(date)) => println!("  Migrated from legacy file on {}", date.format("%Y-%m-%d %H:%M")),
        (true, None) => println!("  Migrated from legacy file"),
        (false, _) => println!("  Not migrated"),
    }

    println!("\nStorage:");
    match store.storage_stats().await? {
        StorageStats::Json {
            path,
            exists,
            size_bytes,
            modified,
        } => {
            println!("  File:     {}", path.display());
            println!("  Exists:   {}", if exists { "yes" } else { "no" });
            println!("  Size:     {} bytes", size_bytes);
            if let Some(modified) = modified {
                println!("  Modified: {}", modified.format("%Y-%m-%d %H:%M:%S"));
            }
        }
        StorageStats::Memory { entries, .. } => println!("  In memory ({} entries)", entries),
    }

    println!("{}", "=".repeat(60));
    Ok(())
}

async fn handle_stats(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let stats = store.stats().await;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

async fn handle_export(config: &Config, args: &[String]) -> Result<()> {
    let path = path_arg(args, "export")?;
    let store = open_store(config).await?;
    store.export_preferences(path).await?;
    println!("Preferences exported to {}", path.display());
    Ok(())
}

async fn handle_import(config: &Config, args: &[String]) -> Result<()> {
    let path = path_arg(args, "import")?;
    let store = open_store(config).await?;
    store.import_preferences(path).await?;
    println!(
        "Imported {} patterns from {}",
        store.stats().await.total_patterns,
        path.display()
    );
    Ok(())
}

async fn handle_clear(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let before = store.stats().await.total_patterns;
    store.clear_preferences().await?;
    println!("Cleared {} learned patterns.", before);
    Ok(())
}

async fn handle_migrate(config: &Config) -> Result<()> {
    let store = PreferencesStore::new(config.store_config())?;

    // Migrate before initialize so the result can be reported
    let migrated = store.migrate_external_preferences().await;
    store.initialize().await?;

    match &config.legacy_preferences_path {
        Some(legacy) if migrated => {
            println!("✓ Migrated preferences from {}", legacy.display());
            println!("  The original file was left in place.");
        }
        Some(legacy) => println!(
            "Nothing to migrate (legacy file {} missing or internal preferences already exist).",
            legacy.display()
        ),
        None => println!("No legacy preferences path configured."),
    }
    println!("Internal preferences: {}", config.preferences_file().display());
    Ok(())
}

fn path_arg<'a>(args: &'a [String], command: &str) -> Result<&'a Path> {
    args.first()
        .map(Path::new)
        .ok_or_else(|| GeminiError::InvalidArgument(format!("Usage: gemini-mcp {} <path>", command)))
}

fn truncate(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or_default();
    if first_line.chars().count() > max_chars {
        let cut: String = first_line.chars().take(max_chars).collect();
        format!("{}...", cut)
    } else {
        first_line.to_string()
    }
}

fn print_usage() {
    println!(
        r#"gemini-mcp v{} - Gemini tools for MCP clients, with learned preferences

USAGE:
    gemini-mcp [COMMAND]

COMMANDS:
    serve                  Run the MCP server on stdio (default)
    inspect                Show learned patterns per context
    stats                  Print preference statistics as JSON
    export <path>          Write preferences to a file
    import <path>          Replace preferences with a file's contents
    clear                  Forget all learned patterns
    migrate                Copy legacy preferences into internal storage
    version                Show version
    help                   Show this help

ENVIRONMENT:
    GEMINI_API_KEY                  API key (required for serve)
    GEMINI_MCP_DATA_DIR             Where preferences are stored
    GEMINI_MCP_LEGACY_PREFERENCES   Legacy preferences file to migrate
    GEMINI_CHAT_MODEL               Model for gemini-chat
    GEMINI_AUDIO_MODEL              Model for gemini-transcribe-audio
    GEMINI_IMAGE_MODEL              Model for gemini-analyze-image
    GEMINI_CODE_MODEL               Model for gemini-code-execute
    GEMINI_API_BASE                 Override the Gemini API endpoint
    DEBUG=true                      Verbose logging (or set RUST_LOG)
"#,
        env!("CARGO_PKG_VERSION")
    );
}
