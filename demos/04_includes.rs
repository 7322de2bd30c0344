//! Example 04: Includes
//!
//! A serving references its tea by id. Loading a serving with
//! `include("tea_id")` brings the tea back in the same request, so the
//! follow-up load is served from the session.
//!
//! Run with: cargo run --example 04_includes

use eyre::Result;
use teastore::samples;
use teastore::{DocumentStore, Serving, StoreConfig, TeaProfile};

fn main() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let store = DocumentStore::open(StoreConfig::at(temp_dir.path()))?;
    store.create_database(store.database())?;

    println!("TeaStore Includes Example");
    println!("=========================\n");

    let serving_ids = {
        let mut session = store.open_session()?;
        for profile in samples::sample_profiles()? {
            session.store(&profile)?;
        }
        let ids = vec![
            session.store(&Serving::new("TeaProfiles/Earl Grey", 95.0))?,
            session.store(&Serving::new("TeaProfiles/Matcha", 80.0))?,
        ];
        session.save_changes()?;
        ids
    };

    println!("1. WITHOUT INCLUDE...");
    {
        let mut session = store.open_session()?;
        if let Some(serving) = session.load::<Serving>(&serving_ids[0])? {
            let tea: Option<TeaProfile> = session.load(&serving.tea_id)?;
            println!("   Tea: {:?}", tea.map(|t| t.name));
        }
        println!("   Requests made: {}\n", session.request_count());
    }

    println!("2. WITH INCLUDE...");
    {
        let mut session = store.open_session()?;
        if let Some(serving) = session.include("tea_id").load::<Serving>(&serving_ids[0])? {
            let tea: Option<TeaProfile> = session.load(&serving.tea_id)?;
            println!("   Tea: {:?}", tea.map(|t| t.name));
        }
        println!("   Requests made: {}\n", session.request_count());
    }

    println!("3. INCLUDE ON A QUERY...");
    {
        let mut session = store.open_session()?;
        let servings: Vec<Serving> = session.include("tea_id").query(&[])?;
        for serving in &servings {
            let tea: Option<TeaProfile> = session.load(&serving.tea_id)?;
            if let Some(tea) = tea {
                println!("   - {} at {:.0} C", tea.name, serving.temperature_c);
            }
        }
        println!("   Requests made: {}", session.request_count());
    }

    println!("\nExample complete!");
    Ok(())
}
