//! Example 02: Load Many and Prefix Scans
//!
//! Loads several documents in a single request, then pages through every
//! tea profile whose id starts with the collection prefix.
//!
//! Run with: cargo run --example 02_load_many_and_prefix

use eyre::Result;
use teastore::samples;
use teastore::{DocumentStore, StoreConfig, TeaProfile};

fn main() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let store = DocumentStore::open(StoreConfig::at(temp_dir.path()))?;
    store.create_database(store.database())?;

    println!("TeaStore Load Many Example");
    println!("==========================\n");

    {
        let mut session = store.open_session()?;
        for profile in samples::sample_profiles()? {
            session.store(&profile)?;
        }
        session.save_changes()?;
    }

    // LOAD MANY: missing ids come back as None
    println!("1. LOAD MANY - three ids, one of them unknown...");
    {
        let mut session = store.open_session()?;
        let teas = session.load_many::<TeaProfile>(&[
            "TeaProfiles/Matcha",
            "TeaProfiles/Sencha",
            "TeaProfiles/Peach Oolong",
        ])?;
        for (id, tea) in &teas {
            match tea {
                Some(tea) => println!("   - {} : {} tea", id, tea.color),
                None => println!("   - {} : not found", id),
            }
        }
        println!("   Requests made: {}\n", session.request_count());
    }

    // STARTING WITH: ordered by id, paged with skip/take
    println!("2. STARTING WITH - pages of 3...");
    {
        let mut session = store.open_session()?;
        let mut skip = 0;
        loop {
            let page: Vec<TeaProfile> = session.load_starting_with("TeaProfiles/", skip, 3)?;
            if page.is_empty() {
                break;
            }
            println!("   Page at {}:", skip);
            for tea in &page {
                println!("   - {}", tea.name);
            }
            skip += page.len();
        }
        println!();

        let m_teas: Vec<TeaProfile> = session.load_starting_with("TeaProfiles/M", 0, 25)?;
        println!("   Teas starting with M: {}", m_teas.len());
    }

    println!("\nExample complete!");
    Ok(())
}
