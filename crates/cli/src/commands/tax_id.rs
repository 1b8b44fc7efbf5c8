//! Tax ID command - generate and validate checksummed identifiers

use anyhow::Result;
use bizdir_domain::{DirectoryError, tax_id};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::args::{TaxIdArgs, TaxIdCommands};

pub fn execute(args: TaxIdArgs) -> Result<()> {
    match args.command {
        TaxIdCommands::Generate { count, seed } => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_rng(&mut rand::rng()),
            };
            for _ in 0..count {
                println!("{}", tax_id::generate_with(&mut rng));
            }
            Ok(())
        }
        TaxIdCommands::Validate { value } => {
            let value = value.trim();
            if !tax_id::is_valid(value) {
                return Err(
                    DirectoryError::validation("tax_id", "must be a valid tax identifier").into(),
                );
            }
            println!("✓ {} is valid", value);
            Ok(())
        }
    }
}
