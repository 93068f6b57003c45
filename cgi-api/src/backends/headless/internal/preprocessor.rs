//! Minimal C-style preprocessor used to produce the per-stage code of a shader branch.
//!
//! Supports object-like `#define`/`#undef`, `#ifdef`, `#ifndef`, `#if`/`#elif` with a single term
//! (`NAME`, `!NAME`, `defined(NAME)`, `!defined(NAME)` or an integer), `#else`, `#endif` and
//! `#error`. Other directives are passed through. Lines removed by conditionals are replaced with
//! empty lines so line numbers in diagnostics stay meaningful.

use fnv::FnvHashMap;

struct Conditional {
    // Is the enclosing block emitting lines
    parent_active: bool,
    // Is the current branch of this conditional emitting lines
    active: bool,
    // Has any branch of this conditional been taken
    taken: bool,
    seen_else: bool,
    line: usize,
}

pub(crate) struct Preprocessor<'a> {
    source_name: &'a str,
    defines: FnvHashMap<String, String>,
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl<'a> Preprocessor<'a> {
    pub fn new(source_name: &'a str) -> Self {
        Preprocessor {
            source_name,
            defines: FnvHashMap::default(),
        }
    }

    pub fn define(
        &mut self,
        name: &str,
        value: &str,
    ) {
        self.defines.insert(name.to_string(), value.to_string());
    }

    fn diagnostic(
        &self,
        line: usize,
        message: &str,
    ) -> String {
        format!("{}({}): {}", self.source_name, line, message)
    }

    fn evaluate(
        &self,
        expression: &str,
        line: usize,
    ) -> Result<bool, String> {
        let expression = expression.trim();
        if let Some(negated) = expression.strip_prefix('!') {
            return self.evaluate(negated, line).map(|value| !value);
        }

        if let Some(rest) = expression.strip_prefix("defined") {
            let name = rest
                .trim()
                .strip_prefix('(')
                .and_then(|s| s.strip_suffix(')'))
                .map(|s| s.trim())
                .unwrap_or_else(|| rest.trim());
            if !is_identifier(name) {
                return Err(self.diagnostic(
                    line,
                    &format!("bad defined() expression \"{}\"", expression),
                ));
            }
            return Ok(self.defines.contains_key(name));
        }

        if let Ok(value) = expression.parse::<i64>() {
            return Ok(value != 0);
        }

        if is_identifier(expression) {
            return Ok(match self.defines.get(expression) {
                Some(value) => value.trim().parse::<i64>().map(|v| v != 0).unwrap_or(true),
                None => false,
            });
        }

        Err(self.diagnostic(
            line,
            &format!("unsupported #if expression \"{}\"", expression),
        ))
    }

    // Replace defined identifiers in a line of code with their values, one level deep
    fn substitute(
        &self,
        line: &str,
    ) -> String {
        if self.defines.is_empty() {
            return line.to_string();
        }

        let mut result = String::with_capacity(line.len());
        let mut identifier = String::new();
        let flush = |identifier: &mut String, result: &mut String| {
            if !identifier.is_empty() {
                match self.defines.get(identifier.as_str()) {
                    Some(value) => result.push_str(value),
                    None => result.push_str(identifier),
                }
                identifier.clear();
            }
        };

        for c in line.chars() {
            if c.is_ascii_alphanumeric() || c == '_' {
                if identifier.is_empty() && c.is_ascii_digit() {
                    result.push(c);
                } else {
                    identifier.push(c);
                }
            } else {
                flush(&mut identifier, &mut result);
                result.push(c);
            }
        }
        flush(&mut identifier, &mut result);
        result
    }

    /// Run the preprocessor over `source`. Errors are formatted diagnostics.
    pub fn process(
        &mut self,
        source: &str,
    ) -> Result<String, String> {
        let mut output = String::with_capacity(source.len());
        let mut stack: Vec<Conditional> = Vec::new();

        for (line_index, line) in source.lines().enumerate() {
            let line_number = line_index + 1;
            let active = stack.last().map(|c| c.active).unwrap_or(true);
            let trimmed = line.trim_start();

            let directive = match trimmed.strip_prefix('#') {
                Some(directive) => directive.trim_start(),
                None => {
                    if active {
                        output.push_str(&self.substitute(line));
                    }
                    output.push('\n');
                    continue;
                }
            };

            let (keyword, argument) = match directive.find(char::is_whitespace) {
                Some(split) => (&directive[..split], directive[split..].trim()),
                None => (directive, ""),
            };

            match keyword {
                "ifdef" | "ifndef" | "if" => {
                    let value = if !active {
                        false
                    } else if keyword == "if" {
                        self.evaluate(argument, line_number)?
                    } else {
                        if !is_identifier(argument) {
                            return Err(self.diagnostic(
                                line_number,
                                &format!("#{} needs a macro name", keyword),
                            ));
                        }
                        let defined = self.defines.contains_key(argument);
                        if keyword == "ifdef" {
                            defined
                        } else {
                            !defined
                        }
                    };
                    stack.push(Conditional {
                        parent_active: active,
                        active: active && value,
                        taken: value,
                        seen_else: false,
                        line: line_number,
                    });
                }
                "elif" => {
                    let conditional = match stack.last() {
                        Some(conditional) if !conditional.seen_else => conditional,
                        _ => return Err(self.diagnostic(line_number, "#elif without #if")),
                    };
                    let value = if conditional.parent_active && !conditional.taken {
                        self.evaluate(argument, line_number)?
                    } else {
                        false
                    };
                    if let Some(conditional) = stack.last_mut() {
                        conditional.active = conditional.parent_active && value;
                        conditional.taken |= value;
                    }
                }
                "else" => match stack.last_mut() {
                    Some(conditional) if !conditional.seen_else => {
                        conditional.active = conditional.parent_active && !conditional.taken;
                        conditional.taken = true;
                        conditional.seen_else = true;
                    }
                    _ => return Err(self.diagnostic(line_number, "#else without #if")),
                },
                "endif" => {
                    if stack.pop().is_none() {
                        return Err(self.diagnostic(line_number, "#endif without #if"));
                    }
                }
                "define" if active => {
                    let (name, value) = match argument.find(char::is_whitespace) {
                        Some(split) => (&argument[..split], argument[split..].trim()),
                        None => (argument, "1"),
                    };
                    if !is_identifier(name) {
                        return Err(self.diagnostic(line_number, "#define needs a macro name"));
                    }
                    let value = self.substitute(value);
                    self.defines.insert(name.to_string(), value);
                }
                "undef" if active => {
                    self.defines.remove(argument);
                }
                "error" if active => {
                    return Err(self.diagnostic(line_number, &format!("#error {}", argument)));
                }
                "include" if active => {
                    return Err(self.diagnostic(line_number, "#include is not supported"));
                }
                _ => {
                    // #pragma, #line, or a directive inside an inactive block
                    if active {
                        output.push_str(line);
                    }
                }
            }

            output.push('\n');
        }

        if let Some(conditional) = stack.last() {
            return Err(self.diagnostic(conditional.line, "unterminated conditional"));
        }

        Ok(output)
    }
}

/// True if `code` contains a function named `entry`, i.e. the name followed by `(`
pub(crate) fn has_entry_point(
    code: &str,
    entry: &str,
) -> bool {
    code.match_indices(entry).any(|(position, _)| {
        let before_ok = code[..position]
            .chars()
            .next_back()
            .map(|c| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(true);
        let after = code[position + entry.len()..].trim_start();
        before_ok && after.starts_with('(')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(
        source: &str,
        defines: &[(&str, &str)],
    ) -> Result<String, String> {
        let mut preprocessor = Preprocessor::new("test.hlsl");
        for (name, value) in defines {
            preprocessor.define(name, value);
        }
        preprocessor.process(source)
    }

    fn code_lines(output: &str) -> Vec<&str> {
        output.lines().map(|l| l.trim()).filter(|l| !l.is_empty()).collect()
    }

    #[test]
    fn selects_branches() {
        let source = "#ifdef DEPTH\ndepth\n#elif defined(SHADOW)\nshadow\n#else\ncolor\n#endif\n";
        assert_eq!(code_lines(&run(source, &[("DEPTH", "1")]).unwrap()), vec!["depth"]);
        assert_eq!(code_lines(&run(source, &[("SHADOW", "1")]).unwrap()), vec!["shadow"]);
        assert_eq!(code_lines(&run(source, &[]).unwrap()), vec!["color"]);
    }

    #[test]
    fn nested_conditionals_and_values() {
        let source = "#if _FS\n#if !INSTANCED\nfs\n#endif\n#endif\n#if 0\nnever\n#endif\n";
        assert_eq!(code_lines(&run(source, &[("_FS", "1")]).unwrap()), vec!["fs"]);
        assert!(code_lines(&run(source, &[("_FS", "1"), ("INSTANCED", "1")]).unwrap()).is_empty());
        assert!(code_lines(&run(source, &[("_FS", "0")]).unwrap()).is_empty());
    }

    #[test]
    fn defines_are_substituted() {
        let source = "#define COUNT 4\nfloat4 values[COUNT];\n#undef COUNT\nfloat x = COUNT;\n";
        assert_eq!(
            code_lines(&run(source, &[]).unwrap()),
            vec!["float4 values[4];", "float x = COUNT;"]
        );
    }

    #[test]
    fn line_numbers_are_preserved() {
        let output = run("#ifdef X\na\n#endif\nb\n", &[]).unwrap();
        assert_eq!(output.lines().nth(3), Some("b"));
    }

    #[test]
    fn reports_errors_with_location() {
        let error = run("ok\n#ifdef _VS\n#error vertex not supported\n#endif\n", &[("_VS", "1")])
            .unwrap_err();
        assert_eq!(error, "test.hlsl(3): #error vertex not supported");

        assert!(run("#ifdef A\n", &[]).is_err());
        assert!(run("#endif\n", &[]).is_err());
        assert!(run("#if A && B\n#endif\n", &[]).is_err());
        // Inactive #error is ignored
        assert!(run("#if 0\n#error nope\n#endif\n", &[]).is_ok());
    }

    #[test]
    fn finds_entry_points() {
        let code = "float4 mainVS(float3 pos : POSITION) {}\nvoid helper_mainFS () {}\n";
        assert!(has_entry_point(code, "mainVS"));
        assert!(!has_entry_point(code, "mainFS"));
        assert!(!has_entry_point(code, "main"));
    }
}
