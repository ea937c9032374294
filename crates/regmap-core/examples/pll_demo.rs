//! Demonstrates driving a PLL-style synthesizer chip through a field map.
//!
//! The device has 16-bit registers; the 32-bit numerator field uses
//! descending layout and is written most-significant register first, the
//! way such chips usually expect their double-word values.
//!
//! Run with:
//!
//! ```text
//! cargo run --example pll_demo
//! REGMAP_TRACING_DIRECTIVES=regmap_core=debug cargo run --example pll_demo
//! ```

use regmap_core::{Device, Field, FieldMap, Flags, MemTransport, Result};
use regmap_tracing::TracingConfig;

static PLL_MAP: &[Field] = &[
    //         name         reg offs width flags
    Field::new("POWERDOWN",  0,  0,   1,   Flags::empty()),
    Field::new("RESET",      0,  1,   1,   Flags::empty()),
    Field::new("FCAL_EN",    0,  2,   1,   Flags::empty()),
    Field::new("_R0_RES",    0,  3,   13,  Flags::empty()),
    Field::new("PLL_N",      2,  0,   16,  Flags::empty()),
    Field::new("PLL_NUM",    5,  0,   32,  Flags::DESCEND.union(Flags::MSR_FIRST)),
    Field::new("LOCKED",     6,  0,   1,   Flags::VOLATILE),
    Field::new("_R6_RES",    6,  1,   15,  Flags::empty()),
];

fn main() -> Result<()> {
    if let Err(err) = regmap_tracing::init_global_tracing(&TracingConfig::from_env()) {
        eprintln!("tracing setup failed: {err}");
    }

    // a memory-backed transport stands in for the SPI glue
    let mut dev = Device::new(16, 8, FieldMap::new(PLL_MAP), MemTransport::new(8))?;

    // prove the map well-formed before trusting it
    dev.check()?;

    dev.set("PLL_N", 250)?;
    dev.set("PLL_NUM", 0x0BEB_C200)?;
    dev.set("FCAL_EN", 1)?;

    println!("N       = {}", dev.get("PLL_N")?);
    println!("NUM     = {:#010x}", dev.get("PLL_NUM")?);
    println!("LOCKED  = {}", dev.get("LOCKED")?);

    println!("\nregister image:");
    for (reg, word) in dev.data().iter().enumerate() {
        println!("   data[{reg}] = {word:#06x}");
    }

    println!("\nbus traffic:");
    for op in dev.transport().journal() {
        println!("   {op:?}");
    }

    Ok(())
}
