mod config;

use std::fs::File;
use std::io;
use std::io::prelude::*;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use clap::{App, Arg, ArgGroup};
use log::debug;

use config::Config;
use solver::{parse_literals, Heuristic, SearchOptions, SearchOutcome, CNF, WalkSatSolver};

/// Accepts the suffixes K, M and B on flip counts.
fn parse_big_number(text: &str) -> Result<i64, String> {
    let (digits, factor) = match text.chars().last() {
        Some('K') => (&text[..text.len() - 1], 1_000),
        Some('M') => (&text[..text.len() - 1], 1_000_000),
        Some('B') => (&text[..text.len() - 1], 1_000_000_000),
        _ => (text, 1),
    };
    digits
        .parse::<i64>()
        .map(|n| n * factor)
        .map_err(|_| format!("Bad argument {}", text))
}

fn parse_number<T: std::str::FromStr>(text: &str) -> Result<T, String> {
    text.parse().map_err(|_| format!("Bad argument {}", text))
}

fn make_config() -> Result<Config, String> {
    let matches = App::new("walksat")
        .version("1.0")
        .about("Stochastic local search for satisfiability in CNF")
        .arg(
            Arg::with_name("input")
                .index(1)
                .help("CNF file, if not specified read stdin"),
        )
        .arg(
            Arg::with_name("seed")
                .long("seed")
                .takes_value(true)
                .help("Seed of the random number generator"),
        )
        .arg(
            Arg::with_name("cutoff")
                .long("cutoff")
                .takes_value(true)
                .default_value("100000")
                .help("Bound on flips per try; suffixes K, M and B are accepted"),
        )
        .arg(
            Arg::with_name("restart")
                .long("restart")
                .alias("tries")
                .takes_value(true)
                .default_value("10")
                .help("Bound on the number of tries"),
        )
        .arg(
            Arg::with_name("numsol")
                .long("numsol")
                .takes_value(true)
                .help("Stop after finding this many solutions"),
        )
        .arg(
            Arg::with_name("target")
                .long("target")
                .takes_value(true)
                .default_value("0")
                .help("Succeed once at most this many clauses are unsatisfied"),
        )
        .arg(
            Arg::with_name("status")
                .long("status")
                .help("Return a fail status if no solution was found"),
        )
        .arg(
            Arg::with_name("super")
                .long("super")
                .help("Scale the cutoff by the series 1,1,2,1,1,2,4,... across tries"),
        )
        .arg(
            Arg::with_name("init")
                .long("init")
                .takes_value(true)
                .value_name("FILE")
                .help("Initialize the listed literals, the rest randomly"),
        )
        .arg(Arg::with_name("random").long("random").help("Pick a random variable of the clause"))
        .arg(
            Arg::with_name("best")
                .long("best")
                .alias("walksat")
                .help("Minimize breaks (default)"),
        )
        .arg(Arg::with_name("gsat").long("gsat").help("Minimize breaks - makes"))
        .arg(
            Arg::with_name("tabu")
                .long("tabu")
                .takes_value(true)
                .value_name("N")
                .help("Tabu list of length N; walk probability defaults to 0"),
        )
        .arg(Arg::with_name("novelty").long("novelty"))
        .arg(Arg::with_name("rnovelty").long("rnovelty"))
        .arg(
            Arg::with_name("plus")
                .long("plus")
                .help("The + variant of novelty and rnovelty"),
        )
        .arg(
            Arg::with_name("alternate")
                .long("alternate")
                .number_of_values(2)
                .value_names(&["WALK", "GREEDY"])
                .help("Alternate WALK walk steps with GREEDY greedy steps"),
        )
        .arg(
            Arg::with_name("bigflip")
                .long("bigflip")
                .number_of_values(2)
                .value_names(&["WALK", "GREEDY"])
                .help("Decide between WALK walk or GREEDY greedy flips at a time"),
        )
        .group(ArgGroup::with_name("heuristic").args(&[
            "random", "best", "gsat", "tabu", "novelty", "rnovelty", "alternate", "bigflip",
        ]))
        .arg(
            Arg::with_name("walkprob")
                .long("walkprob")
                .alias("wp")
                .takes_value(true)
                .value_name("R")
                .help("Walk probability (default 0.5)"),
        )
        .arg(
            Arg::with_name("noise")
                .long("noise")
                .min_values(1)
                .max_values(2)
                .help("Walk probability N/M (default M = 100)"),
        )
        .arg(
            Arg::with_name("nofreebie")
                .long("nofreebie")
                .help("Disable the freebie rule"),
        )
        .arg(
            Arg::with_name("maxfreebie")
                .long("maxfreebie")
                .min_values(0)
                .max_values(1)
                .help("Flip freebies before running the heuristic, skipping with probability P"),
        )
        .arg(
            Arg::with_name("adaptivehh")
                .long("adaptivehh")
                .min_values(0)
                .max_values(2)
                .help("Adapt the noise level with Hoos' method (defaults 0.20 0.20)"),
        )
        .arg(
            Arg::with_name("out")
                .long("out")
                .takes_value(true)
                .value_name("FILE")
                .help("Print the solution as a list of literals to FILE"),
        )
        .arg(
            Arg::with_name("solcnf")
                .long("solcnf")
                .help("Print the solution as v-lines to stdout and stop after one"),
        )
        .get_matches();

    let mut walk_probability = 0.5;
    let mut explicit_noise = false;
    if let Some(text) = matches.value_of("walkprob") {
        walk_probability = parse_number::<f64>(text)?;
        explicit_noise = true;
    }
    if let Some(mut values) = matches.values_of("noise") {
        let numerator: f64 = parse_number(values.next().expect("clap guarantees one value"))?;
        let denominator: f64 = match values.next() {
            Some(text) => parse_number(text)?,
            None => 100.0,
        };
        walk_probability = numerator / denominator;
        explicit_noise = true;
    }

    let plus = matches.is_present("plus");
    let heuristic = if matches.is_present("random") {
        Heuristic::Random
    } else if matches.is_present("gsat") {
        Heuristic::Gsat
    } else if let Some(text) = matches.value_of("tabu") {
        if !explicit_noise {
            walk_probability = 0.0;
        }
        Heuristic::Tabu {
            length: parse_number(text)?,
        }
    } else if matches.is_present("novelty") {
        Heuristic::Novelty { plus }
    } else if matches.is_present("rnovelty") {
        Heuristic::RNovelty { plus }
    } else if let Some(mut values) = matches.values_of("alternate") {
        if !explicit_noise {
            walk_probability = 0.0;
        }
        Heuristic::Alternate {
            walk_length: parse_number(values.next().expect("clap guarantees two values"))?,
            greedy_length: parse_number(values.next().expect("clap guarantees two values"))?,
        }
    } else if let Some(mut values) = matches.values_of("bigflip") {
        Heuristic::BigFlip {
            walk_length: parse_number(values.next().expect("clap guarantees two values"))?,
            greedy_length: parse_number(values.next().expect("clap guarantees two values"))?,
        }
    } else {
        Heuristic::Best
    };

    let adaptive = if matches.is_present("adaptivehh") {
        walk_probability = 0.0;
        let mut values = matches
            .values_of("adaptivehh")
            .into_iter()
            .flatten()
            .map(parse_number::<f64>);
        let phi = values.next().unwrap_or(Ok(0.20))?;
        let theta = values.next().unwrap_or(Ok(0.20))?;
        Some((phi, theta))
    } else {
        None
    };

    let maxfreebie = matches.is_present("maxfreebie");
    let freebie_noise = match matches.value_of("maxfreebie") {
        Some(text) => parse_number(text)?,
        None => 0.0,
    };

    let seed = match matches.value_of("seed") {
        Some(text) => parse_number(text)?,
        None => SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| u64::from(elapsed.subsec_micros()) ^ elapsed.as_secs())
            .unwrap_or(0),
    };

    let sol_cnf = matches.is_present("solcnf");
    let max_solutions = match matches.value_of("numsol") {
        Some(text) => parse_number(text)?,
        None if sol_cnf => 1,
        None => usize::max_value(),
    };

    let init_assignment = match matches.value_of("init") {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .map_err(|e| format!("Cannot open {}: {}", path, e))?;
            Some(parse_literals(&content).map_err(|e| format!("Bad init file {}: {}", path, e))?)
        }
        None => None,
    };

    Ok(Config {
        input: matches.value_of("input").map(String::from),
        out_file: matches.value_of("out").map(String::from),
        sol_cnf,
        status: matches.is_present("status"),
        heuristic,
        options: SearchOptions {
            seed,
            cutoff: parse_big_number(matches.value_of("cutoff").expect("has default"))?,
            tries: parse_number(matches.value_of("restart").expect("has default"))?,
            max_solutions,
            target: parse_number(matches.value_of("target").expect("has default"))?,
            superlinear: matches.is_present("super"),
            walk_probability,
            nofreebie: matches.is_present("nofreebie"),
            maxfreebie,
            freebie_noise,
            adaptive,
            init_assignment,
        },
    })
}

fn read_formula(input: &Option<String>) -> Result<CNF, String> {
    let mut content = String::new();
    match input {
        Some(path) => {
            let mut file =
                File::open(path).map_err(|e| format!("Cannot open file named {}: {}", path, e))?;
            file.read_to_string(&mut content)
                .map_err(|e| format!("Cannot read {}: {}", path, e))?;
            CNF::from_dimacs(&content).map_err(|e| format!("{}: {}", path, e))
        }
        None => {
            io::stdin()
                .read_to_string(&mut content)
                .map_err(|e| format!("Cannot read stdin: {}", e))?;
            CNF::from_dimacs(&content).map_err(|e| format!("stdin: {}", e))
        }
    }
}

fn write_solution_file(path: &str, literals: &[i64]) -> io::Result<()> {
    let mut file = File::create(path)?;
    for chunk in literals.chunks(10) {
        let line = chunk
            .iter()
            .map(|lit| lit.to_string())
            .collect::<Vec<String>>()
            .join(" ");
        writeln!(file, " {}", line)?;
    }
    Ok(())
}

fn report(outcome: &SearchOutcome, seconds: f64) {
    println!("    lowbad     unsat     flips   success");
    let mut successes = 0;
    for (index, t) in outcome.tries.iter().enumerate() {
        if t.success {
            successes += 1;
        }
        println!(
            " {:9} {:9} {:9} {:8}%",
            t.lowest_false,
            t.final_false,
            t.flips,
            successes * 100 / (index + 1)
        );
    }
    println!();
    println!("total elapsed seconds = {:.6}", seconds);
    if seconds > 0.0 {
        println!(
            "average flips per second = {:.0}",
            outcome.total_flips as f64 / seconds
        );
    }
    println!("number solutions found = {}", outcome.successes);
}

fn main() {
    env_logger::init();

    let config = make_config().unwrap_or_else(|message| {
        eprintln!("{}", message);
        process::exit(1);
    });

    let formula = read_formula(&config.input).unwrap_or_else(|message| {
        eprintln!("{}", message);
        process::exit(1);
    });

    println!("seed = {}", config.options.seed);
    println!("cutoff = {}", config.options.cutoff);
    println!("tries = {}", config.options.tries);
    println!("walk probability = {:.3}", config.options.walk_probability);
    println!(
        "numatom = {}, numclause = {}",
        formula.num_variables,
        formula.len()
    );

    // The first interrupt asks the driver to stop at the next try
    // boundary, the second one gives up immediately.
    let abort = Arc::new(AtomicBool::new(false));
    {
        let abort = abort.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            if abort.swap(true, Ordering::Relaxed) {
                process::exit(1);
            }
        }) {
            debug!("no interrupt handler: {}", e);
        }
    }

    let solver = WalkSatSolver::new(config.heuristic, config.options);
    let start = Instant::now();
    let outcome = solver.run(&formula, &abort).unwrap_or_else(|e| {
        eprintln!("{}", e);
        process::exit(1);
    });
    report(&outcome, start.elapsed().as_secs_f64());

    if let Some(literals) = outcome.solution.literals() {
        println!("ASSIGNMENT FOUND");
        if config.sol_cnf {
            for lit in &literals {
                println!("v {}", lit);
            }
        }
        if let Some(path) = &config.out_file {
            if let Err(e) = write_solution_file(path, &literals) {
                eprintln!("Cannot write {}: {}", path, e);
                process::exit(1);
            }
        }
    } else {
        println!("ASSIGNMENT NOT FOUND");
    }

    if config.status && outcome.successes == 0 {
        process::exit(1);
    }
}
