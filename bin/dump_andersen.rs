use clap::Parser;

use pointer_analysis::middle_end::andersen;
use pointer_analysis::middle_end::lir::Program;

/// Dumps `And[v]`, the flow-insensitive Andersen pre-pass result, for every
/// pointer SSA value in a LIR file. Useful for inspecting the pre-pass in
/// isolation from the flow-sensitive propagation that follows it.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    input_file: String,
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

    let result = andersen::solve(&input_program);

    let mut pointers = result.pointers();
    pointers.sort();

    for p in &pointers {
        let and = result.and(p);
        let rendered = and.iter().map(|o| o.to_string()).collect::<Vec<_>>().join(", ");
        println!("{} -> {{{rendered}}}", p.with_funcid());
    }
}
