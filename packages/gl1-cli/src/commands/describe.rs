use crate::cli::DescribeArgs;
use crate::commands::open_input;
use crate::exit_codes;
use crate::output;
use gl1_rs::DescribeScope;

pub fn execute(args: DescribeArgs) -> i32 {
    let scope: DescribeScope = match args.scope.parse() {
        Ok(scope) => scope,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::INPUT_ERROR;
        }
    };

    let mut input = match open_input(&args.source, &args.pool) {
        Ok(input) => input,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::INPUT_ERROR;
        }
    };

    let min_keep = input.config().min_keep;
    input.fill_pool(min_keep);
    log::info!(
        "Window holds {} events after one fill ({})",
        input.buffer().len(),
        scope
    );

    print!("{}", input.describe(scope));

    if args.stats && !output::emit(&input.stats(), false, None) {
        return exit_codes::EXECUTION_ERROR;
    }
    exit_codes::SUCCESS
}
