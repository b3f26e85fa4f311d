use std::collections::HashMap;

use crate::assemble::helper::{AssembledValue, ValueShape};
use crate::param::list_mode::ListMode;
use crate::param::spec::{ModuleSpec, ParameterSpec};
use crate::resolve::href::server_relative_uri;
use crate::resolve::resolver::ValueResolver;

/// Args of every parameter substituted into the module command line
///
/// `<name>` tokens of the module's command line are replaced by the args of that parameter; a
/// parameter with no value removes its token. Tokens naming no parameter are kept as they are.
pub fn command_line(module: &ModuleSpec, values: &[AssembledValue], resolver: &ValueResolver) -> Vec<String> {
    let args: HashMap<&str, Vec<String>> = values
        .iter()
        .filter_map(|value| module.param(&value.name).map(|spec| (value.name.as_str(), param_args(spec, value, resolver))))
        .collect();

    let template = match module.command_line.as_deref() {
        Some(template) => template,
        None => {
            let mut command = vec![module.name.clone()];
            for spec in &module.params {
                command.extend(args.get(spec.name.as_str()).cloned().unwrap_or_default());
            }
            return command;
        }
    };

    let mut command = Vec::new();
    for token in template.split_whitespace() {
        match whole_token(token).and_then(|name| args.get(name)) {
            Some(param_args) => command.extend(param_args.iter().cloned()),
            None => {
                let substituted = substitute(token, &args);
                if !substituted.is_empty() {
                    command.push(substituted);
                }
            }
        }
    }
    command
}

/// `<name>` when the token is nothing but a parameter reference
fn whole_token(token: &str) -> Option<&str> {
    token.strip_prefix('<')?.strip_suffix('>').filter(|name| !name.contains(['<', '>']))
}

/// References embedded in a larger token, e.g. `-t<threshold>` or `--in=<input.file>`
fn substitute(token: &str, args: &HashMap<&str, Vec<String>>) -> String {
    let mut out = String::new();
    let mut rest = token;
    while let Some(start) = rest.find('<') {
        let (before, tail) = rest.split_at(start);
        out.push_str(before);
        match tail.find('>').map(|end| (&tail[1..end], end)) {
            Some((name, end)) if args.contains_key(name) => {
                let value = &args[name];
                if value.is_empty() {
                    // the whole token goes away with its value
                    return String::new();
                }
                out.push_str(&value.join(" "));
                rest = &tail[end + 1..];
            }
            _ => {
                out.push('<');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn param_args(spec: &ParameterSpec, value: &AssembledValue, resolver: &ValueResolver) -> Vec<String> {
    let arg = match &value.shape {
        ValueShape::Empty => return Vec::new(),
        ValueShape::CommandLine { tokens } => return tokens.clone(),
        ValueShape::FileList { path, .. } => path.to_string_lossy().to_string(),
        ValueShape::Single if spec.is_file_or_directory() => local_path(value, resolver),
        ValueShape::Single => value.value.clone(),
    };
    spec.cmd_line_format().tokens(ListMode::CmdOpt, &[arg.as_str()])
}

/// Server files and downloaded copies are passed by path, anything else by URL
fn local_path(value: &AssembledValue, resolver: &ValueResolver) -> String {
    let stored = value.attributes.get("localCopy").unwrap_or(&value.value);
    server_relative_uri(stored, resolver.base_href())
        .and_then(|uri| resolver.layout().from_relative_uri(uri))
        .and_then(|handle| handle.server_path)
        .map(|path| path.to_string_lossy().to_string())
        .unwrap_or_else(|| value.display_value(resolver.base_href()))
}
