//! Before/after extension points around an application's lifecycle hooks.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::app::MicroApp;

/// An extension callback. It receives the application and may suspend.
pub type ExtensionHook = Arc<dyn Fn(&MicroApp) -> BoxFuture<'static, ()> + Send + Sync>;

/// Where an extension runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookStage {
    /// Before `mount`.
    BeforeMount,
    /// After `mount` returned.
    AfterMount,
    /// Before `unmount`.
    BeforeUnmount,
    /// After `unmount` returned.
    AfterUnmount,
    /// Before `update`.
    BeforeUpdate,
    /// After `update` returned.
    AfterUpdate,
}

/// Extension callbacks registered for one application.
#[derive(Clone, Default)]
pub struct ExtensionHooks {
    before_mount: Option<ExtensionHook>,
    after_mount: Option<ExtensionHook>,
    before_unmount: Option<ExtensionHook>,
    after_unmount: Option<ExtensionHook>,
    before_update: Option<ExtensionHook>,
    after_update: Option<ExtensionHook>,
}

impl ExtensionHooks {
    /// No extensions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `hook` at `stage`, replacing any previous one.
    #[must_use]
    pub fn on<F, Fut>(mut self, stage: HookStage, hook: F) -> Self
    where
        F: Fn(&MicroApp) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        *self.slot(stage) = Some(Arc::new(move |app: &MicroApp| hook(app).boxed()));
        self
    }

    fn slot(&mut self, stage: HookStage) -> &mut Option<ExtensionHook> {
        match stage {
            HookStage::BeforeMount => &mut self.before_mount,
            HookStage::AfterMount => &mut self.after_mount,
            HookStage::BeforeUnmount => &mut self.before_unmount,
            HookStage::AfterUnmount => &mut self.after_unmount,
            HookStage::BeforeUpdate => &mut self.before_update,
            HookStage::AfterUpdate => &mut self.after_update,
        }
    }

    fn get(&self, stage: HookStage) -> Option<&ExtensionHook> {
        match stage {
            HookStage::BeforeMount => self.before_mount.as_ref(),
            HookStage::AfterMount => self.after_mount.as_ref(),
            HookStage::BeforeUnmount => self.before_unmount.as_ref(),
            HookStage::AfterUnmount => self.after_unmount.as_ref(),
            HookStage::BeforeUpdate => self.before_update.as_ref(),
            HookStage::AfterUpdate => self.after_update.as_ref(),
        }
    }

    /// Whether an extension is registered for `stage`.
    #[must_use]
    pub fn has(&self, stage: HookStage) -> bool {
        self.get(stage).is_some()
    }

    /// Run the extension for `stage`, if any.
    pub async fn run(&self, stage: HookStage, app: &MicroApp) {
        if let Some(hook) = self.get(stage) {
            hook(app).await;
        }
    }
}

impl fmt::Debug for ExtensionHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stages = [
            HookStage::BeforeMount,
            HookStage::AfterMount,
            HookStage::BeforeUnmount,
            HookStage::AfterUnmount,
            HookStage::BeforeUpdate,
            HookStage::AfterUpdate,
        ];
        f.debug_list()
            .entries(stages.into_iter().filter(|stage| self.has(*stage)))
            .finish()
    }
}
