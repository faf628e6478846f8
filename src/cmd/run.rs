use clap::Args;
use comfy_table::presets::ASCII_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use std::process;
use stockforge::config::RunParams;
use stockforge::model::RunMode;
use stockforge::runner::{RunSummary, Runner};

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub params: RunParams,

    /// Skip the summary tables
    #[arg(short, long, default_value_t = false)]
    pub quiet: bool,
}

pub fn run(args: RunArgs) {
    if args.params.mode == RunMode::Query {
        eprintln!("❌ Use `stockforge query <type>` to describe object types");
        process::exit(1);
    }

    eprintln!("\n🐟 Loading model: {}", args.params.config.display());
    let mut runner = match Runner::from_params(args.params) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("\n❌ FATAL ERROR LOADING MODEL:");
            eprintln!("   {}", e);
            process::exit(1);
        }
    };

    match runner.go() {
        Ok(summary) => {
            if !args.quiet {
                print_summary(&summary);
            }
        }
        Err(e) => {
            eprintln!("\n❌ RUN FAILED:");
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}

fn print_summary(summary: &RunSummary) {
    eprintln!("\n📊 === RUN SUMMARY ({}) === 📊", summary.run_mode);

    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.add_row(vec![
        Cell::new("Score").add_attribute(Attribute::Bold),
        Cell::new(format!("{:.6}", summary.score)).fg(Color::Cyan),
    ]);
    table.add_row(vec![
        Cell::new("Evaluations"),
        Cell::new(summary.evaluations),
    ]);
    table.add_row(vec![Cell::new("Threads"), Cell::new(summary.threads)]);
    if summary.chain_length > 0 {
        table.add_row(vec![
            Cell::new("Chain length"),
            Cell::new(summary.chain_length),
        ]);
    }
    if let Some(rate) = summary.acceptance_rate {
        table.add_row(vec![
            Cell::new("Acceptance"),
            Cell::new(format!("{:.3}", rate)),
        ]);
    }
    if summary.simulations > 0 {
        table.add_row(vec![
            Cell::new("Simulations"),
            Cell::new(summary.simulations),
        ]);
    }
    table.add_row(vec![
        Cell::new("Elapsed"),
        Cell::new(format!("{} ms", summary.elapsed_ms)),
    ]);
    if let Some(col) = table.column_mut(1) {
        col.set_cell_alignment(CellAlignment::Right);
    }
    eprintln!("{}", table);

    if !summary.estimates.is_empty() {
        let mut table = Table::new();
        table
            .load_preset(ASCII_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("Estimate").add_attribute(Attribute::Bold),
            Cell::new("Value").fg(Color::Green),
        ]);
        for (label, value) in &summary.estimates {
            table.add_row(vec![Cell::new(label), Cell::new(format!("{:.6}", value))]);
        }
        eprintln!("{}", table);
    }

    if !summary.profile.is_empty() {
        let mut table = Table::new();
        table.load_preset(ASCII_FULL);
        table.set_header(vec![Cell::new("Profile value"), Cell::new("Score")]);
        for step in &summary.profile {
            table.add_row(vec![
                Cell::new(format!("{:.6}", step.value)),
                Cell::new(format!("{:.6}", step.score)),
            ]);
        }
        eprintln!("{}", table);
    }
}
