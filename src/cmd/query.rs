use clap::Args;
use comfy_table::presets::ASCII_FULL;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use std::process;
use stockforge::catalogue;

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Object type, optionally with a sub type: `process.mortality_event_biomass`
    pub object: String,
}

pub fn run(args: QueryArgs) {
    let found = catalogue::describe(&args.object);
    if found.is_empty() {
        eprintln!("❌ Unknown object type '{}'", args.object);
        eprintln!("   Known types: {}", catalogue::object_types().join(", "));
        process::exit(1);
    }

    for info in found {
        println!("\n📖 {}: {}", info.key(), info.description);

        let mut table = Table::new();
        table
            .load_preset(ASCII_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("Parameter").add_attribute(Attribute::Bold),
            Cell::new("Required"),
            Cell::new("Estimable"),
            Cell::new("Description"),
        ]);
        for p in info.parameters {
            table.add_row(vec![
                Cell::new(p.name),
                Cell::new(if p.required { "yes" } else { "no" }),
                Cell::new(if p.estimable { "yes" } else { "no" }),
                Cell::new(p.description),
            ]);
        }
        println!("{}", table);
    }
}
