//! Expression evaluation, as the script engine would see it.

use std::collections::HashMap;

use pwdongle::expr::{evaluate_condition, try_evaluate};

use super::CommandResult;

pub fn eval(expr: &str, condition: bool, vars: Vec<(String, i32)>) -> CommandResult {
    let env: HashMap<String, i32> = vars.into_iter().collect();

    if condition {
        println!("{}", evaluate_condition(expr, &env));
        return Ok(());
    }

    match try_evaluate(expr, &env) {
        Ok(value) => println!("{value}"),
        Err(e) => {
            // The script engine treats a bad expression as 0
            eprintln!("Parse error: {e}");
            println!("0");
        }
    }
    Ok(())
}
