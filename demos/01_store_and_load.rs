//! Example 01: Store and Load
//!
//! Creates a fresh database, stages the sample teas in a session, commits
//! them with one `save_changes`, then loads one back by id in a new session.
//!
//! Run with: cargo run --example 01_store_and_load

use eyre::Result;
use teastore::console::{self, Stopwatch};
use teastore::samples;
use teastore::{DocumentStore, StoreConfig, TeaProfile};

fn main() -> Result<()> {
    // Create a temporary directory for this example
    let temp_dir = tempfile::tempdir()?;

    println!("TeaStore Store and Load Example");
    println!("===============================\n");

    console::status("App started.");
    let store = DocumentStore::open(StoreConfig::at(temp_dir.path()))?;
    console::status(&format!("Document store initialized with {} database.", store.database()));

    // Delete and recreate, so every run starts empty
    store.delete_database(store.database())?;
    store.create_database(store.database())?;

    // STORE: stage every profile, then commit in one batch
    {
        let mut session = store.open_session()?;
        for profile in samples::sample_profiles()? {
            // data only staged into the session, not in the database yet
            let id = session.store(&profile)?;
            console::success(&format!("Saved {} to session as {}.", profile.name, id));
        }

        console::status("Saving session to database...");
        let stopwatch = Stopwatch::start();
        let count = session.save_changes()?;
        console::success(&format!(
            "Session persisted {} documents in {}.",
            count,
            console::format_duration(stopwatch.elapsed())
        ));
    }

    // LOAD: a new session has nothing tracked, so this is one request
    console::status("Moving to load()");
    {
        let mut session = store.open_session()?;
        let tea: Option<TeaProfile> = session.load("TeaProfiles/Earl Grey")?;
        match tea {
            Some(tea) => console::detail(&format!(
                "Loaded {}. It has {} mg of caffeine!",
                tea.name, tea.caffeine_mg()
            )),
            None => console::detail("Earl Grey not found!"),
        }
        console::detail(&format!("Requests made: {}", session.request_count()));
    }

    store.delete_database(store.database())?;
    println!("\nExample complete!");
    Ok(())
}
