use crate::{CgiError, CgiResult, CgiShaderStageFlags};

/// Prefix of a source line that declares a branch
pub const BRANCH_LINE_PREFIX: &str = "//@";

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CgiShaderMacro {
    pub name: String,
    pub value: String,
}

/// One macro permutation of a shader source.
///
/// The descriptor grammar is `<entry>[:<name>] [MACRO[=VALUE]]... [(<stages>)]`, for example
/// `main:#Depth DEPTH (VF)`. The name defaults to the entry. Stages are single letters:
/// `V`ertex, `H`ull, `D`omain, `G`eometry, `F`ragment, `C`ompute, `T`ask, `M`esh, `R`aygen. They
/// default to `VF`. Each stage's entry point is the entry followed by the stage suffix, e.g.
/// `mainVS`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CgiShaderBranch {
    pub name: String,
    pub entry: String,
    pub macros: Vec<CgiShaderMacro>,
    pub stages: CgiShaderStageFlags,
}

impl CgiShaderBranch {
    pub fn parse(branch_desc: &str) -> CgiResult<Self> {
        let mut tokens: Vec<&str> = branch_desc.split_whitespace().collect();
        if tokens.is_empty() {
            return Err(CgiError::ContentError(
                "empty shader branch descriptor".to_string(),
            ));
        }

        let mut stages = CgiShaderStageFlags::VS_FS;
        if let Some(&last) = tokens.last() {
            if last.starts_with('(') {
                let stage_list = last
                    .strip_prefix('(')
                    .and_then(|s| s.strip_suffix(')'))
                    .ok_or_else(|| {
                        CgiError::ContentError(format!(
                            "unterminated stage list in shader branch \"{}\"",
                            branch_desc
                        ))
                    })?;
                stages = Self::parse_stages(stage_list, branch_desc)?;
                tokens.pop();
            }
        }

        if tokens.is_empty() {
            return Err(CgiError::ContentError(format!(
                "shader branch \"{}\" has no entry point",
                branch_desc
            )));
        }

        let (entry, name) = match tokens[0].split_once(':') {
            Some((entry, name)) => (entry, name),
            None => (tokens[0], tokens[0]),
        };
        if entry.is_empty() || name.is_empty() {
            return Err(CgiError::ContentError(format!(
                "shader branch \"{}\" has an empty entry or name",
                branch_desc
            )));
        }
        if !entry
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(CgiError::ContentError(format!(
                "shader branch entry \"{}\" is not an identifier",
                entry
            )));
        }

        let macros = tokens[1..]
            .iter()
            .map(|&token| {
                let (name, value) = token.split_once('=').unwrap_or((token, "1"));
                if name.is_empty() || name.starts_with('(') {
                    return Err(CgiError::ContentError(format!(
                        "bad macro \"{}\" in shader branch \"{}\"",
                        token, branch_desc
                    )));
                }
                Ok(CgiShaderMacro {
                    name: name.to_string(),
                    value: value.to_string(),
                })
            })
            .collect::<CgiResult<Vec<_>>>()?;

        Ok(CgiShaderBranch {
            name: name.to_string(),
            entry: entry.to_string(),
            macros,
            stages,
        })
    }

    fn parse_stages(
        stage_list: &str,
        branch_desc: &str,
    ) -> CgiResult<CgiShaderStageFlags> {
        let mut stages = CgiShaderStageFlags::empty();
        for tag in stage_list.chars() {
            let stage = CgiShaderStageFlags::from_tag(tag).ok_or_else(|| {
                CgiError::ContentError(format!(
                    "unknown stage '{}' in shader branch \"{}\"",
                    tag, branch_desc
                ))
            })?;
            stages |= stage;
        }

        if stages.is_empty() {
            return Err(CgiError::ContentError(format!(
                "empty stage list in shader branch \"{}\"",
                branch_desc
            )));
        }

        Ok(stages)
    }

    /// Branch descriptors declared with `//@` lines, in source order
    pub fn collect_from_source(source: &str) -> Vec<String> {
        source
            .lines()
            .filter_map(|line| line.trim_start().strip_prefix(BRANCH_LINE_PREFIX))
            .map(|desc| desc.trim().to_string())
            .filter(|desc| !desc.is_empty())
            .collect()
    }

    /// Entry point name of one stage of this branch
    pub fn stage_entry(
        &self,
        stage: CgiShaderStageFlags,
    ) -> Option<String> {
        if !self.stages.contains(stage) {
            return None;
        }
        stage
            .entry_suffix()
            .map(|suffix| format!("{}{}", self.entry, suffix))
    }

    pub fn is_compute(&self) -> bool {
        self.stages == CgiShaderStageFlags::COMPUTE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_descriptor() {
        let branch = CgiShaderBranch::parse("main:#Depth DEPTH SHADOW=2 (VGF)").unwrap();
        assert_eq!(branch.entry, "main");
        assert_eq!(branch.name, "#Depth");
        assert_eq!(
            branch.macros,
            vec![
                CgiShaderMacro {
                    name: "DEPTH".to_string(),
                    value: "1".to_string()
                },
                CgiShaderMacro {
                    name: "SHADOW".to_string(),
                    value: "2".to_string()
                },
            ]
        );
        assert_eq!(
            branch.stages,
            CgiShaderStageFlags::VERTEX
                | CgiShaderStageFlags::GEOMETRY
                | CgiShaderStageFlags::FRAGMENT
        );
        assert_eq!(
            branch.stage_entry(CgiShaderStageFlags::GEOMETRY).as_deref(),
            Some("mainGS")
        );
        assert_eq!(branch.stage_entry(CgiShaderStageFlags::COMPUTE), None);
    }

    #[test]
    fn defaults_to_vertex_fragment() {
        let branch = CgiShaderBranch::parse("main").unwrap();
        assert_eq!(branch.name, "main");
        assert_eq!(branch.stages, CgiShaderStageFlags::VS_FS);
        assert!(branch.macros.is_empty());
    }

    #[test]
    fn compute_branch() {
        let branch = CgiShaderBranch::parse("main:#Blur HORIZONTAL (C)").unwrap();
        assert!(branch.is_compute());
        assert_eq!(
            branch.stage_entry(CgiShaderStageFlags::COMPUTE).as_deref(),
            Some("mainCS")
        );
    }

    #[test]
    fn parsing_is_deterministic() {
        let desc = "mainT:#Instanced INSTANCED TEXCOORD=3 (VF)";
        let first = CgiShaderBranch::parse(desc).unwrap();
        for _ in 0..8 {
            assert_eq!(CgiShaderBranch::parse(desc).unwrap(), first);
        }
    }

    #[test]
    fn rejects_malformed_descriptors() {
        for desc in &["", "   ", "(VF)", "main (VX)", "main ()", "main (VF", ":name", "ma-in"] {
            assert!(
                matches!(CgiShaderBranch::parse(desc), Err(CgiError::ContentError(_))),
                "{} should not parse",
                desc
            );
        }
    }

    #[test]
    fn collects_branch_lines() {
        let source = "//@main:#\n// comment\n  //@main:#Depth DEPTH\nfloat4 mainVS() {}\n//@\n";
        assert_eq!(
            CgiShaderBranch::collect_from_source(source),
            vec!["main:#".to_string(), "main:#Depth DEPTH".to_string()]
        );
    }
}
