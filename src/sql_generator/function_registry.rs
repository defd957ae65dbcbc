/// Cypher to SQL function registry
///
/// Maps Cypher function names to their SQL equivalents with optional argument
/// transformations. Names missing from the registry render unchanged.
use std::collections::HashMap;

/// Function mapping entry
#[derive(Clone)]
pub struct FunctionMapping {
    /// Cypher function name as documented
    #[allow(dead_code)]
    pub cypher_name: &'static str,
    /// SQL function name
    pub sql_name: &'static str,
    /// Optional argument transformation over rendered SQL arguments
    pub arg_transform: Option<fn(&[String]) -> Vec<String>>,
}

/// Get function mapping for a Cypher function name, case-insensitively
pub fn get_function_mapping(cypher_fn: &str) -> Option<FunctionMapping> {
    let fn_lower = cypher_fn.to_lowercase();
    FUNCTION_MAPPINGS.get(fn_lower.as_str()).cloned()
}

/// Renders a call of `name` over already rendered arguments.
pub fn render_call(name: &str, args: Vec<String>) -> String {
    match get_function_mapping(name) {
        Some(mapping) => {
            let args = match mapping.arg_transform {
                Some(transform) => transform(&args),
                None => args,
            };
            format!("{}({})", mapping.sql_name, args.join(", "))
        }
        None => format!("{}({})", name, args.join(", ")),
    }
}

lazy_static::lazy_static! {
    static ref FUNCTION_MAPPINGS: HashMap<&'static str, FunctionMapping> = {
        let mut m = HashMap::new();

        // ===== STRING FUNCTIONS =====

        m.insert("toupper", FunctionMapping {
            cypher_name: "toUpper",
            sql_name: "upper",
            arg_transform: None,
        });

        m.insert("tolower", FunctionMapping {
            cypher_name: "toLower",
            sql_name: "lower",
            arg_transform: None,
        });

        m.insert("trim", FunctionMapping {
            cypher_name: "trim",
            sql_name: "btrim",
            arg_transform: None,
        });

        m.insert("ltrim", FunctionMapping {
            cypher_name: "lTrim",
            sql_name: "ltrim",
            arg_transform: None,
        });

        m.insert("rtrim", FunctionMapping {
            cypher_name: "rTrim",
            sql_name: "rtrim",
            arg_transform: None,
        });

        // substring() is 0-based in Cypher, 1-based in SQL
        m.insert("substring", FunctionMapping {
            cypher_name: "substring",
            sql_name: "substr",
            arg_transform: Some(|args| {
                let mut out = args.to_vec();
                if let Some(start) = out.get_mut(1) {
                    *start = format!("({} + 1)", start);
                }
                out
            }),
        });

        m.insert("reverse", FunctionMapping {
            cypher_name: "reverse",
            sql_name: "reverse",
            arg_transform: None,
        });

        m.insert("tostring", FunctionMapping {
            cypher_name: "toString",
            sql_name: "CAST",
            arg_transform: Some(|args| {
                vec![format!("{} AS TEXT", args.first().cloned().unwrap_or_default())]
            }),
        });

        m.insert("tointeger", FunctionMapping {
            cypher_name: "toInteger",
            sql_name: "CAST",
            arg_transform: Some(|args| {
                vec![format!("{} AS BIGINT", args.first().cloned().unwrap_or_default())]
            }),
        });

        m.insert("tofloat", FunctionMapping {
            cypher_name: "toFloat",
            sql_name: "CAST",
            arg_transform: Some(|args| {
                vec![format!("{} AS DOUBLE PRECISION", args.first().cloned().unwrap_or_default())]
            }),
        });

        // ===== LIST FUNCTIONS =====

        m.insert("size", FunctionMapping {
            cypher_name: "size",
            sql_name: "length",
            arg_transform: None,
        });

        // ===== NUMERIC FUNCTIONS =====

        m.insert("abs", FunctionMapping {
            cypher_name: "abs",
            sql_name: "abs",
            arg_transform: None,
        });

        m.insert("ceil", FunctionMapping {
            cypher_name: "ceil",
            sql_name: "ceil",
            arg_transform: None,
        });

        m.insert("floor", FunctionMapping {
            cypher_name: "floor",
            sql_name: "floor",
            arg_transform: None,
        });

        m.insert("round", FunctionMapping {
            cypher_name: "round",
            sql_name: "round",
            arg_transform: None,
        });

        m.insert("sqrt", FunctionMapping {
            cypher_name: "sqrt",
            sql_name: "sqrt",
            arg_transform: None,
        });

        m.insert("sign", FunctionMapping {
            cypher_name: "sign",
            sql_name: "sign",
            arg_transform: None,
        });

        m.insert("rand", FunctionMapping {
            cypher_name: "rand",
            sql_name: "random",
            arg_transform: None,
        });

        // ===== GENERAL FUNCTIONS =====

        m.insert("coalesce", FunctionMapping {
            cypher_name: "coalesce",
            sql_name: "coalesce",
            arg_transform: None,
        });

        // ===== AGGREGATES =====

        m.insert("collect", FunctionMapping {
            cypher_name: "collect",
            sql_name: "array_agg",
            arg_transform: None,
        });

        m
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mapping = get_function_mapping("toUpper").unwrap();
        assert_eq!(mapping.sql_name, "upper");
        assert_eq!(mapping.cypher_name, "toUpper");
        assert!(get_function_mapping("TOLOWER").is_some());
        assert!(get_function_mapping("nosuchfn").is_none());
    }

    #[test]
    fn test_render_call_applies_transform() {
        assert_eq!(render_call("size", vec!["x".into()]), "length(x)");
        assert_eq!(
            render_call("substring", vec!["s".into(), "2".into()]),
            "substr(s, (2 + 1))"
        );
        assert_eq!(render_call("toString", vec!["n".into()]), "CAST(n AS TEXT)");
        assert_eq!(render_call("greatest", vec!["a".into(), "b".into()]), "greatest(a, b)");
    }
}
