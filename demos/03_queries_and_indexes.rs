//! Example 03: Queries and Indexes
//!
//! Ad-hoc queries run against each collection's auto index (the fields a
//! document lists in `indexed_fields`). Static indexes are registered with
//! the store and queried by name; either way the results are whole documents.
//!
//! Run with: cargo run --example 03_queries_and_indexes

use eyre::Result;
use teastore::{DocumentStore, Filter, FilterOp, StoreConfig, TeaColor, TeaProfile, TeaProfilesByCaffeine};

fn main() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let mut store = DocumentStore::open(StoreConfig::at(temp_dir.path()))?;
    store.create_database(store.database())?;

    println!("TeaStore Queries Example");
    println!("========================\n");

    {
        let mut session = store.open_session()?;
        session.store(&TeaProfile::with_caffeine(TeaColor::Green, "Matcha", 70.0)?)?;
        session.store(&TeaProfile::with_caffeine(TeaColor::Black, "Earl Grey", 34.0)?)?;
        session.store(&TeaProfile::with_caffeine(TeaColor::Black, "Lapsang Souchong", 40.0)?)?;
        session.store(&TeaProfile::with_caffeine(TeaColor::Oolong, "Peach Oolong", 28.0)?)?;
        session.store(&TeaProfile::new(TeaColor::Red, "Rooibos"))?;
        session.save_changes()?;
    }

    println!("1. AUTO INDEX - black teas...");
    {
        let mut session = store.open_session()?;
        let black: Vec<TeaProfile> = session.query(&[Filter::eq("color", i64::from(TeaColor::Black.code()))])?;
        for tea in &black {
            println!("   - {} ({} mg)", tea.name, tea.caffeine_mg());
        }

        println!("\n   Caffeine free teas...");
        let decaf: Vec<TeaProfile> = session.query(&[Filter::eq("has_caffeine", false)])?;
        for tea in &decaf {
            println!("   - {}", tea.name);
        }

        println!("\n   Names containing 'Oolong'...");
        let oolong: Vec<TeaProfile> = session.query(&[Filter::new("name", FilterOp::Contains, "Oolong")])?;
        for tea in &oolong {
            println!("   - {}", tea.name);
        }
    }
    println!();

    println!("2. STATIC INDEX - TeaProfiles/ByCaffeine...");
    let indexed = store.execute_index(TeaProfilesByCaffeine)?;
    println!("   Index built over {} documents", indexed);
    {
        let mut session = store.open_session()?;
        let strong = session.query_index(
            &TeaProfilesByCaffeine,
            &[Filter::gte("caffeine_mg", 30.0), Filter::lt("caffeine_mg", 60.0)],
        )?;
        println!("   Teas with 30-60 mg of caffeine:");
        for tea in &strong {
            println!("   - {} ({} mg)", tea.name, tea.caffeine_mg());
        }

        // New documents are indexed as they are saved
        session.store(&TeaProfile::with_caffeine(TeaColor::Green, "Gyokuro", 120.0)?)?;
        session.save_changes()?;

        let very_strong = session.query_index(&TeaProfilesByCaffeine, &[Filter::gt("caffeine_mg", 100.0)])?;
        println!("   Teas above 100 mg: {}", very_strong.len());
    }

    println!("\nExample complete!");
    Ok(())
}
