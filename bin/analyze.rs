use clap::Parser;

use pointer_analysis::middle_end::lir::Program;
use pointer_analysis::AnalysisConfig;

/// Runs the whole-program pointer analysis over a LIR file and writes its
/// points-to tables out as JSON.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    input_file: String,
    output_file: String,

    /// The function whose missing presence is reported as a warning rather
    /// than a hard failure.
    #[arg(long, default_value = "main")]
    entry_function_name: String,

    #[arg(long, default_value_t = true)]
    ignore_indirect_calls: bool,

    #[arg(long, default_value_t = true)]
    report_incomplete: bool,
}

fn read_from(path: &str) -> String {
    String::from_utf8(
        std::fs::read(path).unwrap_or_else(|_| panic!("Could not read the input file {}", path)),
    )
    .expect("The input file does not contain valid utf-8 text")
}

fn main() {
    let args = Args::parse();

    let input_program = read_from(&args.input_file)
        .parse::<Program>()
        .unwrap()
        .validate()
        .unwrap();

    let config = AnalysisConfig {
        entry_function_name: args.entry_function_name,
        ignore_indirect_calls: args.ignore_indirect_calls,
        report_incomplete: args.report_incomplete,
    };

    let (result, warning) = pointer_analysis::run(&input_program, &config).unwrap();

    if let Some(warning) = &warning {
        eprintln!("warning: {warning}");
    }

    let output = serde_json::to_string_pretty(&result.to_json()).unwrap();
    std::fs::write(&args.output_file, output).unwrap_or_else(|_| {
        panic!(
            "Failed to write the analysis result to the output file: {}",
            args.output_file
        )
    });
}
