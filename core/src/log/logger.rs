use super::LogError;
use log::LevelFilter;
use log4rs::config::Logger;
use std::collections::BTreeMap;

/// Level filters parsed from expressions such as `info,lineage_content=debug,lineage_database`.
///
/// A bare level sets the root level, a bare module name enables that module at the most
/// verbose level. Later expressions override earlier ones.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct LogFilters {
    root: LevelFilter,
    modules: BTreeMap<String, LevelFilter>,
}

impl LogFilters {
    pub fn new(root: LevelFilter) -> Self {
        Self { root, modules: BTreeMap::new() }
    }

    /// Applies every valid directive of `expression`, reporting invalid ones on stderr
    pub fn apply(mut self, expression: &str) -> Self {
        for directive in expression.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            match parse_directive(directive) {
                Ok((None, level)) => self.root = level,
                Ok((Some(module), level)) => {
                    self.modules.insert(module.to_string(), level);
                }
                Err(err) => eprintln!("ignoring log filter: {err}"),
            }
        }
        self
    }

    pub fn root(&self) -> LevelFilter {
        self.root
    }

    pub fn loggers(&self) -> Vec<Logger> {
        self.modules.iter().map(|(module, level)| Logger::builder().build(module.as_str(), *level)).collect()
    }
}

fn parse_directive(directive: &str) -> Result<(Option<&str>, LevelFilter), LogError> {
    let invalid = || LogError::ParseLoggerSpec(directive.to_string());
    match directive.split_once('=') {
        None => Ok(directive.parse::<LevelFilter>().map_or((Some(directive), LevelFilter::max()), |level| (None, level))),
        Some((module, level)) => {
            let (module, level) = (module.trim(), level.trim());
            if module.is_empty() || level.contains('=') {
                return Err(invalid());
            }
            if level.is_empty() {
                return Ok((Some(module), LevelFilter::max()));
            }
            level.parse().map(|level| (Some(module), level)).map_err(|_| invalid())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_expression() {
        let filters = LogFilters::new(LevelFilter::Info).apply("warn, lineage_content=debug,lineage_database,bogus=loud,=info");
        assert_eq!(filters.root(), LevelFilter::Warn);
        let modules = filters.loggers().iter().map(|l| (l.name().to_string(), l.level())).collect::<Vec<_>>();
        assert_eq!(
            modules,
            vec![("lineage_content".to_string(), LevelFilter::Debug), ("lineage_database".to_string(), LevelFilter::max())]
        );
    }

    #[test]
    fn test_later_expressions_override() {
        let filters = LogFilters::new(LevelFilter::Info).apply("lineage_content=trace").apply("error,lineage_content=info");
        assert_eq!(filters.root(), LevelFilter::Error);
        assert_eq!(filters.loggers()[0].level(), LevelFilter::Info);
        assert_eq!(LogFilters::new(LevelFilter::Info).apply("").root(), LevelFilter::Info);
    }
}
