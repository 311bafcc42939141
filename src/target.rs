// src/target.rs

//! Target declarations.
//!
//! A [`Target`] is a plain record plus a body. It doubles as its own builder:
//!
//! ```
//! use builddag::target::Target;
//!
//! let compile = Target::new("Compile")
//!     .depends_on(["Restore"])
//!     .produces("output/bin/*.dll")
//!     .executes(|ctx| {
//!         println!("compiling in {}", ctx.build().root_dir().display());
//!         Ok(())
//!     });
//! assert_eq!(compile.depends_on, vec!["Restore".to_string()]);
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::BuildContext;
use crate::engine::TargetName;
use crate::exec::command::CommandBody;
use crate::partition::{PartitionSlice, PartitionSpec};

pub type BodyFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

/// The side-effecting action of a target.
///
/// Bodies are opaque to the engine: it awaits the returned future and only
/// looks at `Ok` / `Err`.
pub trait TargetBody: Send + Sync {
    fn execute<'a>(&'a self, ctx: &'a TargetContext) -> BodyFuture<'a>;

    /// Short human-readable form for plan output.
    fn describe(&self) -> Option<String> {
        None
    }
}

/// Body for targets that only aggregate or trigger others.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBody;

impl TargetBody for NoopBody {
    fn execute<'a>(&'a self, _ctx: &'a TargetContext) -> BodyFuture<'a> {
        Box::pin(async { Ok(()) })
    }
}

/// Synchronous closure body.
///
/// The closure runs on Tokio's blocking pool, so it may do blocking IO or
/// wait on child processes without holding up other targets.
pub struct FnBody<F>(Arc<F>);

impl<F> TargetBody for FnBody<F>
where
    F: Fn(&TargetContext) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn execute<'a>(&'a self, ctx: &'a TargetContext) -> BodyFuture<'a> {
        let body = Arc::clone(&self.0);
        let ctx = ctx.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || body(&ctx))
                .await
                .map_err(|e| anyhow::anyhow!("target body panicked: {e}"))?
        })
    }
}

/// What a body gets to see while it runs.
#[derive(Debug, Clone)]
pub struct TargetContext {
    target: TargetName,
    build: Arc<BuildContext>,
    partition: Option<PartitionSlice>,
}

impl TargetContext {
    pub fn new(
        target: impl Into<TargetName>,
        build: Arc<BuildContext>,
        partition: Option<PartitionSlice>,
    ) -> Self {
        Self {
            target: target.into(),
            build,
            partition,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn build(&self) -> &BuildContext {
        &self.build
    }

    /// The slice of work for a partitioned target.
    pub fn partition(&self) -> Option<&PartitionSlice> {
        self.partition.as_ref()
    }

    /// Environment for spawned processes.
    pub fn env_vars(&self) -> Vec<(String, String)> {
        let mut vars = self.build.env_vars();
        vars.push(("BUILDDAG_TARGET".to_string(), self.target.clone()));
        if let Some(slice) = &self.partition {
            if let Some(index) = slice.index {
                vars.push(("BUILDDAG_PARTITION_INDEX".to_string(), index.to_string()));
            }
            vars.push((
                "BUILDDAG_PARTITION_COUNT".to_string(),
                slice.count.to_string(),
            ));
            vars.push(("BUILDDAG_PARTITION_ITEMS".to_string(), slice.items.join("\n")));
        }
        vars
    }
}

/// A precondition evaluated right before the body.
#[derive(Clone)]
pub enum Requirement {
    /// Parameter must be set to a non-blank value.
    Parameter(String),
    /// Parameter must equal `value` (ASCII case-insensitive).
    ParameterEquals { name: String, value: String },
    /// Shell command must exit with status 0.
    Command(String),
    /// Arbitrary check over the build context.
    Predicate {
        description: String,
        check: Arc<dyn Fn(&BuildContext) -> bool + Send + Sync>,
    },
}

impl Requirement {
    pub fn predicate<F>(description: impl Into<String>, check: F) -> Self
    where
        F: Fn(&BuildContext) -> bool + Send + Sync + 'static,
    {
        Requirement::Predicate {
            description: description.into(),
            check: Arc::new(check),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Requirement::Parameter(name) => format!("parameter '{name}' is set"),
            Requirement::ParameterEquals { name, value } => {
                format!("parameter '{name}' equals '{value}'")
            }
            Requirement::Command(cmd) => format!("command `{cmd}` succeeds"),
            Requirement::Predicate { description, .. } => description.clone(),
        }
    }
}

impl fmt::Debug for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// A named, orderable unit of build work.
#[derive(Clone)]
pub struct Target {
    pub name: TargetName,
    pub description: Option<String>,
    pub depends_on: Vec<TargetName>,
    pub before: Vec<TargetName>,
    pub after: Vec<TargetName>,
    pub triggers: Vec<TargetName>,
    pub requires: Vec<Requirement>,
    pub produces: Vec<String>,
    pub consumes: Vec<String>,
    pub partition: Option<PartitionSpec>,
    pub proceed_after_failure: bool,
    pub body: Arc<dyn TargetBody>,
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("name", &self.name)
            .field("depends_on", &self.depends_on)
            .field("before", &self.before)
            .field("after", &self.after)
            .field("triggers", &self.triggers)
            .field("requires", &self.requires)
            .field("proceed_after_failure", &self.proceed_after_failure)
            .finish_non_exhaustive()
    }
}

fn names<I, S>(items: I) -> impl Iterator<Item = TargetName>
where
    I: IntoIterator<Item = S>,
    S: Into<TargetName>,
{
    items.into_iter().map(Into::into)
}

impl Target {
    /// A target with no relations and a no-op body.
    pub fn new(name: impl Into<TargetName>) -> Self {
        Self {
            name: name.into(),
            description: None,
            depends_on: Vec::new(),
            before: Vec::new(),
            after: Vec::new(),
            triggers: Vec::new(),
            requires: Vec::new(),
            produces: Vec::new(),
            consumes: Vec::new(),
            partition: None,
            proceed_after_failure: false,
            body: Arc::new(NoopBody),
        }
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn depends_on<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TargetName>,
    {
        self.depends_on.extend(names(targets));
        self
    }

    pub fn before<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TargetName>,
    {
        self.before.extend(names(targets));
        self
    }

    pub fn after<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TargetName>,
    {
        self.after.extend(names(targets));
        self
    }

    pub fn triggers<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TargetName>,
    {
        self.triggers.extend(names(targets));
        self
    }

    pub fn requires(mut self, requirement: Requirement) -> Self {
        self.requires.push(requirement);
        self
    }

    pub fn requires_param(self, name: impl Into<String>) -> Self {
        self.requires(Requirement::Parameter(name.into()))
    }

    pub fn produces(mut self, glob: impl Into<String>) -> Self {
        self.produces.push(glob.into());
        self
    }

    pub fn consumes(mut self, glob: impl Into<String>) -> Self {
        self.consumes.push(glob.into());
        self
    }

    pub fn partition(mut self, spec: PartitionSpec) -> Self {
        self.partition = Some(spec);
        self
    }

    pub fn proceed_after_failure(mut self) -> Self {
        self.proceed_after_failure = true;
        self
    }

    pub fn with_body(mut self, body: impl TargetBody + 'static) -> Self {
        self.body = Arc::new(body);
        self
    }

    pub fn executes<F>(self, f: F) -> Self
    where
        F: Fn(&TargetContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.with_body(FnBody(Arc::new(f)))
    }

    /// Run `cmd` through the platform shell.
    pub fn command(self, cmd: impl Into<String>) -> Self {
        self.with_body(CommandBody::new(cmd))
    }
}
