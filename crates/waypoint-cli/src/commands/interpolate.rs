use anyhow::{bail, Result};
use colored::Colorize;
use waypoint_router::{interpolate_path, InterpolateOptions, Params, PathError, RoutePattern};

pub fn execute(pattern: &str, params: &[String], leave_params: bool, leave_wildcards: bool) -> Result<()> {
    let pattern = RoutePattern::compile(pattern);
    let params = parse_params(params)?;
    let options = InterpolateOptions {
        leave_params,
        leave_wildcards,
        ..Default::default()
    };

    match interpolate_path(&pattern, &params, &options) {
        Ok(built) => {
            println!("{}", built.path.green().bold());
            let unused: Vec<&str> = params
                .keys()
                .filter(|key| !built.used_params.contains_key(*key))
                .map(String::as_str)
                .collect();
            if !unused.is_empty() {
                println!("{} {}", "Unused params:".yellow(), unused.join(", "));
            }
            Ok(())
        }
        Err(PathError::MissingParam { param, pattern }) => {
            println!("{} `{}`", "✗ Missing param".red().bold(), param.cyan());
            bail!("cannot interpolate `{}` without `{}`", pattern, param)
        }
        Err(error) => Err(error.into()),
    }
}

/// Parses `key=value` pairs
pub fn parse_params(pairs: &[String]) -> Result<Params> {
    let mut params = Params::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("invalid param `{}`, expected key=value", pair);
        };
        params.insert(key.to_string(), value.to_string());
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_params() {
        let params = parse_params(&["postId=42".to_string(), "_splat=a/b=c".to_string()]).unwrap();
        assert_eq!(params.get("postId").map(String::as_str), Some("42"));
        assert_eq!(params.get("_splat").map(String::as_str), Some("a/b=c"));
    }

    #[test]
    fn test_parse_params_rejects_bare_key() {
        assert!(parse_params(&["postId".to_string()]).is_err());
    }

    #[test]
    fn test_missing_param_fails() {
        assert!(execute("/posts/$postId", &[], false, false).is_err());
        assert!(execute("/posts/$postId", &["postId=1".to_string()], false, false).is_ok());
    }
}
