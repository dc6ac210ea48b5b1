/// How a build diagnostic is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Not checked.
    #[default]
    Ignore,
    /// Logged with `warn!` and collected as a [`ScheduleBuildWarning`](crate::ecs::schedule::ScheduleBuildWarning).
    Warn,
    /// Fails the build.
    Error,
}

/// Options for building a schedule.
///
/// ```rust,ignore
/// schedule.set_build_settings(
///     ScheduleBuildSettings::default()
///         .with_ambiguity_detection(LogLevel::Error)
///         .with_report_sets(false),
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleBuildSettings {
    /// How to report systems with conflicting access and no relative order.
    ///
    /// Defaults to [`LogLevel::Ignore`].
    pub ambiguity_detection: LogLevel,

    /// How to report redundant containment edges.
    ///
    /// Defaults to [`LogLevel::Warn`].
    pub hierarchy_detection: LogLevel,

    /// Insert `ApplyDeferred` sync points between systems with deferred mutations and the
    /// systems ordered after them.
    ///
    /// Defaults to `true`.
    pub auto_insert_apply_deferred: bool,

    /// Strip module paths from names in diagnostics.
    ///
    /// Defaults to `true`.
    pub use_shortnames: bool,

    /// List the sets a system belongs to next to its name in diagnostics.
    ///
    /// Defaults to `true`.
    pub report_sets: bool,
}

impl Default for ScheduleBuildSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl ScheduleBuildSettings {
    /// The default settings.
    pub const fn new() -> Self {
        Self {
            ambiguity_detection: LogLevel::Ignore,
            hierarchy_detection: LogLevel::Warn,
            auto_insert_apply_deferred: true,
            use_shortnames: true,
            report_sets: true,
        }
    }

    /// Set [`ambiguity_detection`](Self::ambiguity_detection).
    pub const fn with_ambiguity_detection(mut self, level: LogLevel) -> Self {
        self.ambiguity_detection = level;
        self
    }

    /// Set [`hierarchy_detection`](Self::hierarchy_detection).
    pub const fn with_hierarchy_detection(mut self, level: LogLevel) -> Self {
        self.hierarchy_detection = level;
        self
    }

    /// Set [`auto_insert_apply_deferred`](Self::auto_insert_apply_deferred).
    pub const fn with_auto_insert_apply_deferred(mut self, enabled: bool) -> Self {
        self.auto_insert_apply_deferred = enabled;
        self
    }

    /// Set [`use_shortnames`](Self::use_shortnames).
    pub const fn with_use_shortnames(mut self, enabled: bool) -> Self {
        self.use_shortnames = enabled;
        self
    }

    /// Set [`report_sets`](Self::report_sets).
    pub const fn with_report_sets(mut self, enabled: bool) -> Self {
        self.report_sets = enabled;
        self
    }
}
