use clap::{Parser, Subcommand, ValueEnum};
use eyre::Result;
use std::path::PathBuf;
use teastore::console::{self, Stopwatch};
use teastore::samples;
use teastore::{
    Document, DocumentStore, Filter, Index, NamingConvention, Serving, StoreConfig, TEA_PROFILE_PREFIX, TeaProfile,
    TeaProfilesByCaffeine,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "teastore")]
#[command(about = "TeaStore CLI - tea profile samples against a document store")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Path to a YAML config file (default: <config dir>/teastore/teastore.yml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the databases (overrides the config file)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Database to work with (overrides the config file)
    #[arg(short, long)]
    database: Option<String>,

    /// Naming convention for ids (overrides the config file)
    #[arg(long, value_enum)]
    convention: Option<ConventionArg>,

    /// Log debug output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full walkthrough: recreate the database, store, load, query, include
    Demo {
        /// Keep the database afterwards instead of deleting it
        #[arg(long)]
        keep: bool,
    },

    /// Create the database
    CreateDb,

    /// Delete the database and all its documents
    DeleteDb,

    /// Store the sample tea profiles
    Seed,

    /// Load a tea profile by name
    Load { name: String },

    /// List tea profiles whose id starts with a prefix
    List {
        /// Id prefix (default: the convention's prefix for tea profiles)
        #[arg(long)]
        prefix: Option<String>,

        #[arg(long, default_value_t = 0)]
        skip: usize,

        #[arg(long, default_value_t = 25)]
        take: usize,
    },

    /// Query tea profiles by caffeine content through the static index
    Query {
        /// Minimum caffeine in mg (exclusive)
        #[arg(long, default_value_t = 0.0)]
        min_caffeine: f64,
    },

    /// Print the id a tea name gets under the active convention
    Id { name: String },

    /// Rebuild the database cache from its JSONL logs
    Sync,

    /// Show document counts per collection
    Stats,
}

#[derive(Clone, Copy, ValueEnum)]
enum ConventionArg {
    /// TeaProfiles/<name> for tea profiles, <collection>/<name> for the rest
    Prefixed,
    /// <name>
    Bare,
    /// <collection>/<name>
    Collection,
}

impl From<ConventionArg> for NamingConvention {
    fn from(arg: ConventionArg) -> Self {
        match arg {
            ConventionArg::Prefixed => NamingConvention::tea_profiles(),
            ConventionArg::Bare => NamingConvention::Bare,
            ConventionArg::Collection => NamingConvention::default(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let mut config = StoreConfig::load(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(database) = cli.database {
        config.database = database;
    }
    if let Some(convention) = cli.convention {
        config.conventions.naming = convention.into();
    }

    let mut store = DocumentStore::open(config)?;

    match cli.command {
        Commands::Demo { keep } => run_demo(&mut store, keep)?,
        Commands::CreateDb => {
            store.create_database(store.database())?;
            console::success(&format!("Created database {}", store.database()));
        }
        Commands::DeleteDb => {
            if store.delete_database(store.database())? {
                console::success(&format!("Deleted database {}", store.database()));
            } else {
                console::status(&format!("Database {} does not exist", store.database()));
            }
        }
        Commands::Seed => {
            if !store.database_exists(store.database()) {
                store.create_database(store.database())?;
            }
            let count = store_samples(&store)?;
            console::success(&format!("Stored {} tea profiles", count));
        }
        Commands::Load { name } => {
            let id = store.conventions().naming.identity_for(TeaProfile::collection_name(), &name)?;
            let mut session = store.open_session()?;
            match session.load::<TeaProfile>(&id)? {
                Some(tea) => print_tea(&id, &tea),
                None => console::status(&format!("No tea profile with id {}", id)),
            }
        }
        Commands::List { prefix, skip, take } => {
            let prefix = prefix.unwrap_or_else(|| store.conventions().naming.id_prefix(TeaProfile::collection_name()));
            let mut session = store.open_session()?;
            let teas: Vec<TeaProfile> = session.load_starting_with(&prefix, skip, take)?;
            for tea in &teas {
                print_tea(&tea_id(&store, tea)?, tea);
            }
            console::status(&format!("{} tea profiles", teas.len()));
        }
        Commands::Query { min_caffeine } => {
            store.execute_index(TeaProfilesByCaffeine)?;
            let mut session = store.open_session()?;
            let teas = session.query_index(&TeaProfilesByCaffeine, &[Filter::gt("caffeine_mg", min_caffeine)])?;
            for tea in &teas {
                print_tea(&tea_id(&store, tea)?, tea);
            }
            console::status(&format!("{} tea profiles above {} mg", teas.len(), min_caffeine));
        }
        Commands::Id { name } => {
            println!("{}", store.conventions().naming.identity_for(TeaProfile::collection_name(), &name)?);
        }
        Commands::Sync => {
            let mut db = store.open_database(store.database())?;
            console::status("Syncing database from JSONL files...");
            db.sync()?;
            console::success("Sync complete");
        }
        Commands::Stats => {
            let db = store.open_database(store.database())?;
            for (collection, count) in db.collection_stats()? {
                println!("{:<16} {}", collection, count);
            }
        }
    }

    Ok(())
}

fn tea_id(store: &DocumentStore, tea: &TeaProfile) -> Result<String> {
    Ok(teastore::derive_identity(&store.conventions().naming, tea)?)
}

fn print_tea(id: &str, tea: &TeaProfile) {
    console::detail(&format!(
        "{}: {} tea, {} mg of caffeine{}",
        id,
        tea.color,
        tea.caffeine_mg(),
        if tea.has_caffeine() { "" } else { " (caffeine free)" }
    ));
}

fn store_samples(store: &DocumentStore) -> Result<usize> {
    let mut session = store.open_session()?;
    for profile in samples::sample_profiles()? {
        // Staged in the session only, nothing is in the database yet
        session.store(&profile)?;
        console::write_line(&format!("Saved {} to session.", profile.name), colored::Color::Green);
    }

    console::status("Saving session to database...");
    let stopwatch = Stopwatch::start();
    let count = session.save_changes()?;
    console::success(&format!(
        "Session persisted to database in {}.",
        console::format_duration(stopwatch.elapsed())
    ));
    Ok(count)
}

fn run_demo(store: &mut DocumentStore, keep: bool) -> Result<()> {
    let database = store.database().to_string();
    console::status(&format!("Document store initialized with {} database.", database));

    // Start from a clean database
    store.delete_database(&database)?;
    store.create_database(&database)?;

    // Store
    store_samples(store)?;
    let naming = store.conventions().naming.clone();
    let earl_grey_id = naming.identity_for(TeaProfile::collection_name(), "Earl Grey")?;

    // Load
    console::status("Moving to load()");
    {
        let mut session = store.open_session()?;
        if let Some(tea) = session.load::<TeaProfile>(&earl_grey_id)? {
            console::detail(&format!(
                "Loaded {}. It has {} mg of caffeine!",
                tea.name, tea.caffeine_mg()
            ));
        }
    }

    // Load many
    console::status("Moving to load_many()");
    {
        let ids: Vec<String> = ["Matcha", "Masala Chai", "Sencha"]
            .iter()
            .map(|name| naming.identity_for(TeaProfile::collection_name(), name))
            .collect::<Result<_, _>>()?;
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();

        let mut session = store.open_session()?;
        for (id, tea) in session.load_many::<TeaProfile>(&id_refs)? {
            match tea {
                Some(tea) => print_tea(&id, &tea),
                None => console::detail(&format!("{}: not found", id)),
            }
        }
        console::detail(&format!("Requests made: {}", session.request_count()));
    }

    // Starting with, paged
    console::status("Moving to load_starting_with()");
    {
        let prefix = naming.id_prefix(TeaProfile::collection_name());
        let mut session = store.open_session()?;
        let mut skip = 0;
        loop {
            let page: Vec<TeaProfile> = session.load_starting_with(&prefix, skip, 3)?;
            if page.is_empty() {
                break;
            }
            let names: Vec<&str> = page.iter().map(|t| t.name.as_str()).collect();
            console::detail(&format!("Page at {}: {}", skip, names.join(", ")));
            skip += page.len();
        }
    }

    // Ad-hoc query
    console::status("Moving to query()");
    {
        let mut session = store.open_session()?;
        let chai: Vec<TeaProfile> = session.query(&[Filter::eq("color", i64::from(teastore::TeaColor::Chai.code()))])?;
        for tea in &chai {
            print_tea(&tea_id(store, tea)?, tea);
        }
    }

    // Static index
    console::status("Moving to static index query");
    let (indexed, elapsed) = console::timed(|| store.execute_index(TeaProfilesByCaffeine));
    console::detail(&format!(
        "Index {} built over {} documents in {}",
        TeaProfilesByCaffeine.name(),
        indexed?,
        console::format_duration(elapsed)
    ));
    {
        let mut session = store.open_session()?;
        let caffeinated = session.query_index(&TeaProfilesByCaffeine, &[Filter::gt("caffeine_mg", 0.0)])?;
        console::detail(&format!("{} caffeinated teas", caffeinated.len()));
    }

    // Include
    console::status("Moving to include()");
    let serving_id = {
        let mut session = store.open_session()?;
        let id = session.store(&Serving::new(&earl_grey_id, 95.0))?;
        session.save_changes()?;
        id
    };
    {
        let mut session = store.open_session()?;
        if let Some(serving) = session.include("tea_id").load::<Serving>(&serving_id)? {
            let tea: Option<TeaProfile> = session.load(&serving.tea_id)?;
            if let Some(tea) = tea {
                console::detail(&format!(
                    "Served {} at {:.0} C on {}",
                    tea.name,
                    serving.temperature_c,
                    serving.served_at.format("%Y-%m-%d %H:%M")
                ));
            }
        }
        console::detail(&format!(
            "Requests made: {} (the tea came with the serving)",
            session.request_count()
        ));
    }

    if keep {
        console::success(&format!("Kept database {}.", database));
    } else {
        store.delete_database(&database)?;
        console::success(&format!("Deleted database {}.", database));
    }

    console::detail(&format!(
        "Ids used the {} convention, e.g. {}",
        convention_label(&naming),
        earl_grey_id
    ));
    Ok(())
}

fn convention_label(naming: &NamingConvention) -> String {
    match naming {
        NamingConvention::Prefixed { prefix, .. } if prefix == TEA_PROFILE_PREFIX => "hardcoded prefix".to_string(),
        NamingConvention::Prefixed { prefix, .. } => format!("{} prefix", prefix),
        NamingConvention::Bare => "bare name".to_string(),
        NamingConvention::Collection { separator } => format!("collection + '{}'", separator),
    }
}
