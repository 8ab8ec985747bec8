use clap::Parser;

use pointer_analysis::middle_end::lir::{Instruction, Program};
use pointer_analysis::middle_end::objects::Object;
use pointer_analysis::AnalysisConfig;

/// Flags every `store` whose destination pointer's points-to set may include
/// bottom (an uninitialized cell): a possible null/uninitialized-pointer
/// dereference.
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

    let config = AnalysisConfig::default();
    let (result, warning) = pointer_analysis::run(&input_program, &config).unwrap();
    if let Some(warning) = &warning {
        eprintln!("warning: {warning}");
    }

    let mut found = 0;
    for (fid, func) in &input_program.functions {
        for (bbid, bb) in &func.body {
            for (idx, inst) in bb.insts.iter().enumerate() {
                if !matches!(inst, Instruction::Store { .. }) {
                    continue;
                }
                let loc = (
                    fid.clone(),
                    pointer_analysis::middle_end::labels::ProgramPoint::Instruction(bbid.clone(), idx),
                );
                let target = result.store_target(&loc);
                if target.contains(&Object::Bottom) {
                    found += 1;
                    println!("{fid}:{bbid}:{idx}: possible null-pointer write: `{inst}`");
                }
            }
        }
    }

    if found == 0 {
        println!("no possible null-pointer writes found");
    }

    if result.is_incomplete() {
        eprintln!("warning: analysis is incomplete; results may under-report");
    }
}
