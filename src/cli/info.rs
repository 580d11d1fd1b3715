use anyhow::Result;
use robotkernel_engine::{Engine, Interpreter};

use crate::cli::context::CliContext;

pub async fn cmd_info(ctx: &CliContext) -> Result<()> {
    let config = ctx.config();
    let engine = Interpreter::new();

    println!("robotkernel System Information");
    println!("==============================");
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!("Build Date: {}", env!("BUILD_DATE"));
    println!("Git Commit: {}", env!("GIT_HASH"));
    println!();

    println!("Configuration ({}):", ctx.config_path().display());
    println!("- Suite Name: {}", config.suite_name);
    println!("- Preloaded Libraries: {}", config.libraries.join(", "));
    match config.completion.limit {
        0 => println!("- Completion Limit: unlimited"),
        limit => println!("- Completion Limit: {limit}"),
    }
    println!(
        "- Embed Images: {} (max width {}px)",
        config.artifacts.embed_images, config.artifacts.max_image_width
    );
    match &config.scratch_root {
        Some(root) => println!("- Scratch Root: {}", root.display()),
        None => println!("- Scratch Root: (system temp dir)"),
    }
    println!();

    println!("Available Libraries:");
    for name in engine.available_libraries() {
        let keywords = engine
            .library_doc(&name)
            .map(|doc| doc.keywords.len())
            .unwrap_or_default();
        println!("- {name} ({keywords} keywords)");
    }
    Ok(())
}
