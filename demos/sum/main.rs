//! # sum
//!
//! Adds two operands taken from flags or the environment.
//!
//! ```sh
//! cargo run --example sum -- --a=2 --b=2
//! # 2.000000 + 2.000000 = 4.000000
//! B=40 cargo run --example sum -- --a=2
//! cargo run --example sum -- --help
//! ```

use serde::{Deserialize, Serialize};

use flagfig::{Flagfig, FlagfigError};

#[derive(Serialize, Deserialize, Debug)]
struct Operands {
    a: f64,
    b: f64,
}

fn main() {
    let loader = Flagfig::builder(Operands { a: 0.0, b: 0.0 })
        .describe("a", "Operand A")
        .describe("b", "Operand B")
        .build();

    let operands = match loader {
        Ok(loader) => loader.into_inner(),
        Err(FlagfigError::Flags(e)) => e.exit(),
        Err(e) => {
            eprintln!("Failed to load operands:\n{e}");
            std::process::exit(1);
        }
    };

    println!(
        "{:.6} + {:.6} = {:.6}",
        operands.a,
        operands.b,
        operands.a + operands.b
    );
}
