use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum NavigationOperation {
    /// Swap the current history entry without a page reload when `shallow`.
    ReplaceRoute { href: String, shallow: bool },
    ScrollIntoView { anchor: String },
}

impl Operation for NavigationOperation {
    type Output = ();
}

/// Router and viewport requests. Fire-and-forget.
pub struct Navigation<Ev> {
    context: CapabilityContext<NavigationOperation, Ev>,
}

impl<Ev> Capability<Ev> for Navigation<Ev> {
    type Operation = NavigationOperation;
    type MappedSelf<MappedEv> = Navigation<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Navigation::new(self.context.map_event(f))
    }
}

impl<Ev> Navigation<Ev>
where
    Ev: Send + 'static,
{
    pub fn new(context: CapabilityContext<NavigationOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn replace_route(&self, href: impl Into<String>, shallow: bool) {
        self.notify(NavigationOperation::ReplaceRoute {
            href: href.into(),
            shallow,
        });
    }

    pub fn scroll_into_view(&self, anchor: impl Into<String>) {
        self.notify(NavigationOperation::ScrollIntoView {
            anchor: anchor.into(),
        });
    }

    fn notify(&self, operation: NavigationOperation) {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            ctx.notify_shell(operation).await;
        });
    }
}
