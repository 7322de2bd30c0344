//! Example 05: Naming Conventions
//!
//! The same tea gets a different id under each naming convention. The
//! convention is part of the store's configuration, so every session of a
//! store derives ids the same way.
//!
//! Run with: cargo run --example 05_naming_conventions

use eyre::Result;
use teastore::{DocumentStore, NamingConvention, Serving, StoreConfig, StoreError, TeaColor, TeaProfile, derive_identity};

fn main() -> Result<()> {
    println!("TeaStore Naming Conventions Example");
    println!("===================================\n");

    let earl_grey = TeaProfile::with_caffeine(TeaColor::Black, "Earl Grey", 34.0)?;

    println!("1. DERIVED IDS...");
    for convention in [
        NamingConvention::tea_profiles(),
        NamingConvention::Bare,
        NamingConvention::Collection { separator: '/' },
        NamingConvention::Collection { separator: '-' },
    ] {
        println!("   {:?} -> {}", convention, derive_identity(&convention, &earl_grey)?);
    }
    println!();

    println!("2. BLANK NAMES AND NAMES WITH THE SEPARATOR ARE REJECTED...");
    for name in ["", "Earl/Grey"] {
        match derive_identity(&NamingConvention::Bare, &TeaProfile::new(TeaColor::Green, name)) {
            Err(StoreError::InvalidArgument(message)) => println!("   InvalidArgument: {}", message),
            other => println!("   Unexpected: {:?}", other),
        }
    }
    println!();

    // The hardcoded prefix only applies to tea profiles
    let serving = Serving::new("TeaProfiles/Earl Grey", 95.0);
    println!(
        "   A serving under the prefixed convention: {}\n",
        derive_identity(&NamingConvention::tea_profiles(), &serving)?
    );

    println!("3. STORE WITH A BARE-NAME CONVENTION...");
    let temp_dir = tempfile::tempdir()?;
    let store = DocumentStore::open(StoreConfig::at(temp_dir.path()).with_naming(NamingConvention::Bare))?;
    store.create_database(store.database())?;
    {
        let mut session = store.open_session()?;
        let id = session.store(&earl_grey)?;
        session.save_changes()?;
        println!("   Stored as: {}", id);
    }
    {
        let mut session = store.open_session()?;
        let tea: Option<TeaProfile> = session.load("Earl Grey")?;
        println!("   Loaded by bare name: {}", tea.is_some());
    }

    println!("\nExample complete!");
    Ok(())
}
