//! Entry point for modelparts.
//! Loads one model and extracts the requested parts through a shared cache.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Result, bail};
use futures_util::future::join_all;
use parts::{BufferMode, ObjFileLoader, PartLoader, PartOptions, ResourceCache, SelectedPart};

#[derive(Debug, Default, PartialEq)]
struct Args {
    model: Option<String>,
    parts: Vec<String>,
    buffer_mode: BufferMode,
    reset_position: bool,
    root: Option<PathBuf>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    // Accept: --model=<file> --part=<name>... --buffer=indexed|deindexed --reset-position --root=<dir>
    let mut parsed = Args::default();
    for arg in args {
        if let Some(v) = arg.strip_prefix("--model=") {
            parsed.model = Some(v.to_string());
        } else if let Some(v) = arg.strip_prefix("--part=") {
            parsed.parts.push(v.to_string());
        } else if let Some(v) = arg.strip_prefix("--buffer=") {
            parsed.buffer_mode = v.parse()?;
        } else if let Some(v) = arg.strip_prefix("--root=") {
            parsed.root = Some(PathBuf::from(v));
        } else if arg == "--reset-position" {
            parsed.reset_position = true;
        } else {
            log::warn!("Ignoring unknown argument '{arg}'");
        }
    }
    Ok(parsed)
}

fn describe(part: &SelectedPart) -> String {
    let mesh = part.asset.mesh();
    let mut line = format!(
        "'{}' -> node '{}', {} triangles, indexed={}",
        part.asset.part,
        part.asset.node.name,
        mesh.map_or(0, |m| m.triangle_count()),
        mesh.is_some_and(|m| m.is_indexed()),
    );
    if let Some(pos) = part.original_position {
        line.push_str(&format!(", was at ({:.3}, {:.3}, {:.3})", pos.x, pos.y, pos.z));
    }
    line
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args(std::env::args().skip(1))?;
    let Some(model) = args.model.clone() else {
        bail!("missing --model=<file>");
    };
    if args.parts.is_empty() {
        log::warn!("No --part given; nothing to extract from '{model}'");
        return Ok(());
    }

    let loader = ObjFileLoader::new(args.root.clone().unwrap_or_default());
    log::info!(
        "Loading {} part(s) from '{}' under '{}' ({:?}, reset_position={})",
        args.parts.len(),
        model,
        loader.root().display(),
        args.buffer_mode,
        args.reset_position
    );
    let parts = PartLoader::new(Arc::new(ResourceCache::new()), loader);

    let requests = args.parts.iter().map(|name| {
        let options = PartOptions::part(name.as_str())
            .buffer_mode(args.buffer_mode)
            .reset_position(args.reset_position);
        let model = model.as_str();
        let parts = &parts;
        async move { (name, parts.load_part(model, &options).await) }
    });
    let results = pollster::block_on(join_all(requests));

    let mut failed = 0usize;
    for (name, result) in results {
        match result {
            Ok(Some(part)) => log::info!("{}", describe(&part)),
            Ok(None) => {}
            Err(err) => {
                failed += 1;
                log::error!("Part '{name}': {err}");
            }
        }
    }
    log::info!("Cache holds {} model(s)", parts.cache().len());

    if failed > 0 {
        bail!("{failed} of {} part(s) failed", args.parts.len());
    }
    Ok(())
}
