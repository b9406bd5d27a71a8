use std::fs::File;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use land_atlas::{
    claims::{read_claims, ClaimFilter},
    config::{AtlasConfig, BaseMapStyle},
    geometry::{area_caveats, ring_area, square_meters_to_hectares, AreaCaveat},
    inspect::{build_popup, build_tooltip},
    io::{self, geojson::read_features_file},
    loader::LoadOutcome,
    store::{ExportFormat, JsonFileStore, LayerStore, StoredLayer},
    styles::LayerStyle,
    surface::HeadlessEngine,
    AtlasError, MapView,
};
use spin_on::spin_on;

#[derive(Parser)]
#[command(name = "land_atlas_cli", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the approximate area of every polygon in a GeoJSON file.
    Area { path: String },
    /// Print the tooltip (or popup) content of a GeoJSON feature.
    Inspect {
        path: String,
        #[arg(long, default_value_t = 0)]
        index: usize,
        #[arg(long)]
        popup: bool,
    },
    /// List the layers held by a layer store file.
    Layers { store: String },
    /// Add a GeoJSON file to a layer store, replacing a layer with the same id.
    Import {
        store: String,
        path: String,
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Export one stored layer.
    Export {
        store: String,
        layer: String,
        #[arg(long, default_value = "geojson")]
        format: String,
        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<String>,
    },
    /// Delete one stored layer.
    Delete { store: String, layer: String },
    /// Load a layer store into a headless map and print the engine calls as JSON.
    Render {
        store: String,
        #[arg(long)]
        config: Option<String>,
        /// Base imagery: satellite, terrain or osm.
        #[arg(long)]
        style: Option<String>,
        #[arg(long, default_value_t = 1024)]
        width: u32,
        #[arg(long, default_value_t = 768)]
        height: u32,
    },
    /// Summarize official claim records after filtering.
    Claims {
        path: String,
        #[arg(long, default_value = "all")]
        status: String,
        #[arg(long, default_value = "all")]
        district: String,
        #[arg(long, default_value = "all")]
        state: String,
    },
}

fn init_logging() {
    if let Ok(path) = std::env::var("LAND_ATLAS_LOG") {
        match File::create(&path) {
            Ok(file) => {
                env_logger::Builder::from_default_env()
                    .target(env_logger::Target::Pipe(Box::new(file)))
                    .init();
            }
            Err(e) => {
                eprintln!("Failed to create log file {}: {}", path, e);
                env_logger::Builder::from_default_env().init();
            }
        }
    } else {
        env_logger::Builder::from_default_env().init();
    }
}

fn feature_label(class: Option<&str>, idx: usize) -> String {
    class
        .map(str::to_string)
        .unwrap_or_else(|| format!("feature-{}", idx + 1))
}

fn run(command: Commands) -> land_atlas::Result<()> {
    match command {
        Commands::Area { path } => {
            let features = read_features_file(&path)?;
            if features.is_empty() {
                println!("No polygons in {}", path);
            }
            for (idx, f) in features.iter().enumerate() {
                let area = ring_area(&f.geometry);
                println!(
                    "{}: {:.2} m2 ({:.4} ha)",
                    feature_label(f.class.as_deref(), idx),
                    area,
                    square_meters_to_hectares(area)
                );
                for caveat in area_caveats(&f.geometry) {
                    if caveat != AreaCaveat::PlanarApproximation {
                        println!("  warning: {}", caveat.message());
                    }
                }
            }
        }
        Commands::Inspect { path, index, popup } => {
            let features = read_features_file(&path)?;
            let feature = features.get(index).ok_or_else(|| {
                AtlasError::InvalidValue(format!(
                    "feature index {} out of range ({} polygon(s))",
                    index,
                    features.len()
                ))
            })?;
            let label = feature_label(feature.class.as_deref(), index);
            let block = if popup {
                build_popup(&feature.attributes, &label, None)
            } else {
                build_tooltip(&feature.attributes, &label, None)
            };
            println!("{}", block.to_text());
        }
        Commands::Layers { store } => {
            let layers = spin_on(JsonFileStore::new(&store).list_layers())?;
            if layers.is_empty() {
                println!("No layers in {}", store);
            }
            for layer in layers {
                println!("{}\t{}\t{} feature(s)", layer.id, layer.name, layer.feature_count());
            }
        }
        Commands::Import {
            store,
            path,
            id,
            name,
        } => {
            let features = read_features_file(&path)?;
            let name = name.unwrap_or_else(|| id.clone());
            let layer = StoredLayer::from_features(&id, &name, LayerStyle::default(), &features);
            spin_on(JsonFileStore::new(&store).save_layer(layer))?;
            println!("Imported {} polygon(s) into layer '{}'", features.len(), id);
        }
        Commands::Export {
            store,
            layer,
            format,
            output,
        } => {
            let format = ExportFormat::from_str(&format)?;
            let bytes = spin_on(JsonFileStore::new(&store).export_layer(&layer, format))?;
            match output {
                Some(out) => {
                    io::write_bytes(&out, &bytes)?;
                    println!("Exported layer '{}' to {} as {}", layer, out, format);
                }
                None => println!("{}", String::from_utf8_lossy(&bytes)),
            }
        }
        Commands::Delete { store, layer } => {
            spin_on(JsonFileStore::new(&store).delete_layer(&layer))?;
            println!("Deleted layer '{}'", layer);
        }
        Commands::Render {
            store,
            config,
            style,
            width,
            height,
        } => {
            let mut config = match config {
                Some(path) => AtlasConfig::from_json_file(&path)?,
                None => AtlasConfig::default(),
            };
            if let Some(style) = style {
                config.base_style = BaseMapStyle::from_str(&style)?;
            }
            let mut view = MapView::mount(HeadlessEngine::new(width, height), config);
            let outcome = spin_on(view.reload_layers(&JsonFileStore::new(&store)));
            if let LoadOutcome::Loaded { layers, features } = outcome {
                log::info!("rendering {} layer(s), {} feature(s)", layers, features);
            }
            for notice in view.notices().iter() {
                eprintln!("{:?}: {}", notice.severity, notice.message);
            }
            for op in view.surface().engine().ops() {
                println!("{}", serde_json::to_string(op)?);
            }
        }
        Commands::Claims {
            path,
            status,
            district,
            state,
        } => {
            let records = read_claims(&io::read_to_string(&path)?)?;
            let filter = ClaimFilter::from_selection(&status, &district, &state)?;
            let mut view = MapView::mount(HeadlessEngine::new(1024, 768), AtlasConfig::default());
            let shown = view.load_claims(&records, &filter)?;
            println!("Showing {} of {} claim(s)", shown, records.len());
            for layer in view
                .registry()
                .filter(|l| matches!(l.kind, land_atlas::LayerKind::Official(_)))
            {
                println!("{}: {}", layer.name, layer.feature_count());
            }
        }
    }
    Ok(())
}

fn main() {
    init_logging();
    let cli = Cli::parse();
    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
