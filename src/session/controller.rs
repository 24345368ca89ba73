//! Session registry and coordination.
//!
//! One controller owns every open terminal: creation, focus, z-order,
//! close/terminate lifecycle, lazy surface attachment, and the debounced
//! persistence of the whole session list. Sessions are isolated from each
//! other; a failure in one never touches its siblings.

use super::store::SessionStore;
use super::{drain_queue, Dialect, Geometry, Session, SessionId, Terminal};
use crate::dispatch::Executor;
use crate::display::DisplaySurface;
use crate::editor::Key;
use crate::error::EngineError;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

/// Trailing-edge delay before the session list is written to the store.
pub const PERSIST_DEBOUNCE: Duration = Duration::from_millis(300);
/// Delay before a geometry change re-fits the rendering surface.
pub const RESIZE_DEBOUNCE: Duration = Duration::from_millis(50);

const CASCADE_STEP: i32 = 24;

/// Field patch for `update`; `None` leaves a field alone.
#[derive(Clone, Debug, Default)]
pub struct SessionPatch {
    pub title: Option<String>,
    pub geometry: Option<Geometry>,
    pub minimized: Option<bool>,
}

struct Registry {
    terminals: HashMap<SessionId, Arc<Mutex<Terminal>>>,
    /// Creation order, used for persistence and cascade placement.
    order: Vec<SessionId>,
    focused: Option<SessionId>,
    next_z: u64,
}

impl Registry {
    fn new() -> Self {
        Self {
            terminals: HashMap::new(),
            order: Vec::new(),
            focused: None,
            next_z: 1,
        }
    }
}

pub struct SessionController {
    registry: Arc<Mutex<Registry>>,
    executor: Arc<dyn Executor>,
    store: Arc<dyn SessionStore>,
    persist_tx: mpsc::UnboundedSender<()>,
}

impl SessionController {
    pub fn new(executor: Arc<dyn Executor>, store: Arc<dyn SessionStore>) -> Self {
        let registry = Arc::new(Mutex::new(Registry::new()));
        let (persist_tx, mut persist_rx) = mpsc::unbounded_channel();

        let task_registry = Arc::clone(&registry);
        let task_store = Arc::clone(&store);
        tokio::spawn(async move {
            while persist_rx.recv().await.is_some() {
                tokio::time::sleep(PERSIST_DEBOUNCE).await;
                // coalesce everything that arrived during the delay
                while persist_rx.try_recv().is_ok() {}
                if let Err(e) = persist(&task_registry, &task_store).await {
                    log::warn!("session persistence failed: {e}");
                }
            }
        });

        Self {
            registry,
            executor,
            store,
            persist_tx,
        }
    }

    /// Open a new terminal: cascaded placement, top of the z-order, focused.
    /// The display surface is bound later via [`SessionController::attach`].
    pub async fn create(
        &self,
        title: Option<&str>,
        dialect: Dialect,
        working_directory: &str,
    ) -> SessionId {
        let mut registry = self.registry.lock().await;
        let index = registry.order.len();
        let title = match title {
            Some(t) => t.to_string(),
            None => format!("Terminal {}", index + 1),
        };

        let mut session = Session::new(&title, dialect, working_directory);
        let step = (index % 8) as i32 * CASCADE_STEP;
        session.geometry.x += step;
        session.geometry.y += step;
        session.z_order = registry.next_z;
        registry.next_z += 1;

        let id = session.id;
        log::info!("created session {id} ({title}, {dialect:?})");
        session.focused = true;
        let terminal = Arc::new(Mutex::new(Terminal::new(session, self.executor.clone())));
        registry.terminals.insert(id, terminal);
        registry.order.push(id);

        // single-focus invariant: the new session takes the keyboard
        for (tid, terminal) in &registry.terminals {
            if *tid != id {
                terminal.lock().await.session_mut().focused = false;
            }
        }
        registry.focused = Some(id);
        drop(registry);

        self.schedule_persist();
        id
    }

    pub async fn get(&self, id: SessionId) -> Option<Arc<Mutex<Terminal>>> {
        self.registry.lock().await.terminals.get(&id).cloned()
    }

    async fn require(&self, id: SessionId) -> Result<Arc<Mutex<Terminal>>, EngineError> {
        self.get(id).await.ok_or(EngineError::UnknownSession(id))
    }

    /// Snapshot of every session record, in creation order.
    pub async fn sessions(&self) -> Vec<Session> {
        snapshot(&self.registry).await
    }

    pub async fn focused(&self) -> Option<SessionId> {
        self.registry.lock().await.focused
    }

    /// Make `id` the keyboard target. Exactly one session is focused at a
    /// time; everyone else loses the flag.
    pub async fn focus(&self, id: SessionId) -> Result<(), EngineError> {
        let mut registry = self.registry.lock().await;
        if !registry.terminals.contains_key(&id) {
            return Err(EngineError::UnknownSession(id));
        }
        for (tid, terminal) in &registry.terminals {
            terminal.lock().await.session_mut().focused = *tid == id;
        }
        registry.focused = Some(id);
        Ok(())
    }

    /// Monotonically increasing z-order; returns the new rank.
    pub async fn bring_to_front(&self, id: SessionId) -> Result<u64, EngineError> {
        let terminal = self.require(id).await?;
        let mut registry = self.registry.lock().await;
        let z = registry.next_z;
        registry.next_z += 1;
        drop(registry);
        terminal.lock().await.session_mut().z_order = z;
        self.schedule_persist();
        Ok(z)
    }

    pub async fn update(&self, id: SessionId, patch: SessionPatch) -> Result<(), EngineError> {
        let terminal = self.require(id).await?;
        {
            let mut t = terminal.lock().await;
            let session = t.session_mut();
            if let Some(title) = patch.title {
                session.title = title;
            }
            if let Some(geometry) = patch.geometry {
                session.geometry = geometry;
            }
            if let Some(minimized) = patch.minimized {
                session.minimized = minimized;
            }
        }
        self.schedule_persist();
        Ok(())
    }

    pub async fn set_dialect(&self, id: SessionId, dialect: Dialect) -> Result<(), EngineError> {
        let terminal = self.require(id).await?;
        terminal.lock().await.set_dialect(dialect);
        self.schedule_persist();
        Ok(())
    }

    /// Bind a display surface to a session and print its opening lines
    /// (banner, connectivity-probe result, prompt). Called lazily, when the
    /// session first becomes visible.
    pub async fn attach(
        &self,
        id: SessionId,
        surface: Box<dyn DisplaySurface>,
    ) -> Result<(), EngineError> {
        let terminal = self.require(id).await?;
        let probe = self.executor.probe().await;
        if let Err(e) = &probe {
            log::warn!("session {id}: connectivity probe failed: {e}");
        }
        terminal.lock().await.attach(surface, probe);
        self.schedule_persist();
        Ok(())
    }

    /// Hide a session. It stays in the registry and the persisted list with
    /// its history intact, and can be re-attached later.
    pub async fn close(&self, id: SessionId) -> Result<(), EngineError> {
        let mut registry = self.registry.lock().await;
        let terminal = registry
            .terminals
            .get(&id)
            .cloned()
            .ok_or(EngineError::UnknownSession(id))?;
        {
            let mut t = terminal.lock().await;
            t.detach();
            let session = t.session_mut();
            session.visible = false;
            session.focused = false;
        }
        if registry.focused == Some(id) {
            registry.focused = None;
        }
        drop(registry);
        self.schedule_persist();
        Ok(())
    }

    /// Remove a session permanently, from the registry and the store.
    pub async fn terminate(&self, id: SessionId) -> Result<(), EngineError> {
        let mut registry = self.registry.lock().await;
        if registry.terminals.remove(&id).is_none() {
            return Err(EngineError::UnknownSession(id));
        }
        registry.order.retain(|sid| *sid != id);
        if registry.focused == Some(id) {
            registry.focused = None;
        }
        drop(registry);
        log::info!("terminated session {id}");
        self.schedule_persist();
        Ok(())
    }

    /// Route one keystroke to a session. Only an attached session can be the
    /// keyboard target. A queued submission starts that session's FIFO
    /// drain; other sessions' requests proceed independently.
    pub async fn handle_key(&self, id: SessionId, key: Key) -> Result<(), EngineError> {
        let terminal = self.require(id).await?;
        let queued = {
            let mut t = terminal.lock().await;
            if !t.is_attached() {
                return Err(EngineError::Detached(id));
            }
            t.handle_key(key)
        };
        if queued {
            tokio::spawn(drain_queue(Arc::clone(&terminal)));
            self.schedule_persist();
        }
        Ok(())
    }

    /// Debounced re-fit after a geometry change; buffer state is untouched.
    pub async fn resize(&self, id: SessionId) -> Result<(), EngineError> {
        let terminal = self.require(id).await?;
        let generation = terminal.lock().await.begin_resize();
        tokio::spawn(async move {
            tokio::time::sleep(RESIZE_DEBOUNCE).await;
            terminal.lock().await.refit(generation);
        });
        Ok(())
    }

    /// Rebuild the registry from the store. Restored sessions come back
    /// active but unattached; surfaces are bound lazily per session.
    pub async fn restore(&self) -> Result<usize, EngineError> {
        let stored = self.store.load().await?;
        let count = stored.len();
        let mut registry = self.registry.lock().await;
        for mut session in stored {
            session.attached = false;
            session.focused = false;
            registry.next_z = registry.next_z.max(session.z_order + 1);
            let id = session.id;
            let terminal = Arc::new(Mutex::new(Terminal::new(session, self.executor.clone())));
            registry.terminals.insert(id, terminal);
            registry.order.push(id);
        }
        registry.focused = None;
        log::info!("restored {count} sessions");
        Ok(count)
    }

    /// Write the session list immediately, bypassing the debounce.
    pub async fn persist_now(&self) -> Result<(), EngineError> {
        persist(&self.registry, &self.store).await
    }

    fn schedule_persist(&self) {
        let _ = self.persist_tx.send(());
    }
}

async fn snapshot(registry: &Arc<Mutex<Registry>>) -> Vec<Session> {
    let registry = registry.lock().await;
    let mut sessions = Vec::with_capacity(registry.order.len());
    for id in &registry.order {
        if let Some(terminal) = registry.terminals.get(id) {
            sessions.push(terminal.lock().await.session().clone());
        }
    }
    sessions
}

async fn persist(
    registry: &Arc<Mutex<Registry>>,
    store: &Arc<dyn SessionStore>,
) -> Result<(), EngineError> {
    let sessions = snapshot(registry).await;
    store.save(&sessions).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::testing::ScriptedExecutor;
    use crate::dispatch::DispatchState;
    use crate::display::testing::RecordingSurface;
    use crate::session::store::MemoryStore;

    fn controller_with(
        script: Vec<Result<crate::dispatch::ExecResponse, crate::error::DispatchError>>,
    ) -> (SessionController, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let executor = Arc::new(ScriptedExecutor::new(script));
        (SessionController::new(executor, store.clone()), store)
    }

    async fn wait_idle(controller: &SessionController, id: SessionId) {
        let terminal = controller.get(id).await.unwrap();
        loop {
            {
                let t = terminal.lock().await;
                if !t.in_flight && t.pending.is_empty() {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    async fn type_line(controller: &SessionController, id: SessionId, line: &str) {
        for ch in line.chars() {
            controller.handle_key(id, Key::Char(ch)).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_create_cascades_and_focuses() {
        let (controller, _store) = controller_with(vec![]);
        let first = controller.create(None, Dialect::PosixBash, "/").await;
        let second = controller.create(None, Dialect::PosixBash, "/").await;

        let sessions = controller.sessions().await;
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[1].geometry.x, sessions[0].geometry.x + CASCADE_STEP);
        assert!(sessions[1].z_order > sessions[0].z_order);
        assert_eq!(sessions[0].title, "Terminal 1");

        // only the newest session holds focus
        assert_eq!(controller.focused().await, Some(second));
        assert!(!sessions[0].focused);
        assert!(sessions[1].focused);
        let _ = first;
    }

    #[tokio::test]
    async fn test_focus_is_exclusive() {
        let (controller, _store) = controller_with(vec![]);
        let first = controller.create(None, Dialect::PosixBash, "/").await;
        let _second = controller.create(None, Dialect::PosixBash, "/").await;
        controller.focus(first).await.unwrap();

        let sessions = controller.sessions().await;
        let focused: Vec<_> = sessions.iter().filter(|s| s.focused).collect();
        assert_eq!(focused.len(), 1);
        assert_eq!(focused[0].id, first);
    }

    #[tokio::test]
    async fn test_bring_to_front_is_monotonic() {
        let (controller, _store) = controller_with(vec![]);
        let first = controller.create(None, Dialect::PosixBash, "/").await;
        let second = controller.create(None, Dialect::PosixBash, "/").await;
        let z1 = controller.bring_to_front(first).await.unwrap();
        let z2 = controller.bring_to_front(second).await.unwrap();
        assert!(z2 > z1);
    }

    #[tokio::test]
    async fn test_close_hides_but_keeps_session() {
        let (controller, _store) = controller_with(vec![]);
        let id = controller.create(None, Dialect::PosixBash, "/").await;
        controller.close(id).await.unwrap();

        let sessions = controller.sessions().await;
        assert_eq!(sessions.len(), 1);
        assert!(!sessions[0].visible);
        assert!(!sessions[0].attached);
        assert!(sessions[0].active);
        assert_eq!(controller.focused().await, None);
    }

    #[tokio::test]
    async fn test_terminate_removes_session() {
        let (controller, store) = controller_with(vec![]);
        let id = controller.create(None, Dialect::PosixBash, "/").await;
        controller.terminate(id).await.unwrap();
        assert!(controller.sessions().await.is_empty());
        controller.persist_now().await.unwrap();
        assert!(store.snapshot().is_empty());

        // operations on a terminated session fail cleanly
        assert!(matches!(
            controller.close(id).await,
            Err(EngineError::UnknownSession(_))
        ));
    }

    #[tokio::test]
    async fn test_end_to_end_submission_through_controller() {
        let (controller, _store) =
            controller_with(vec![ScriptedExecutor::ok("/home/user\n", None)]);
        let id = controller.create(None, Dialect::PosixBash, "/home/user").await;
        let surface = RecordingSurface::new();
        controller.attach(id, Box::new(surface.clone())).await.unwrap();

        surface.clear();
        type_line(&controller, id, "pwd").await;
        controller.handle_key(id, Key::Enter).await.unwrap();
        wait_idle(&controller, id).await;

        assert_eq!(surface.rendered(), "pwd\r\n/home/user\r\n/home/user$ ");
        let sessions = controller.sessions().await;
        assert_eq!(sessions[0].working_directory, "/home/user");
        assert_eq!(sessions[0].history, ["pwd"]);
    }

    #[tokio::test]
    async fn test_sessions_dispatch_independently() {
        let store = Arc::new(MemoryStore::new());
        let mut executor = ScriptedExecutor::new(vec![
            ScriptedExecutor::ok("a\n", None),
            ScriptedExecutor::ok("b\n", None),
        ]);
        executor.delay = Some(Duration::from_millis(10));
        let controller = SessionController::new(Arc::new(executor), store);

        let first = controller.create(None, Dialect::PosixBash, "/").await;
        let second = controller.create(None, Dialect::PosixBash, "/").await;
        for id in [first, second] {
            let surface = RecordingSurface::new();
            controller.attach(id, Box::new(surface)).await.unwrap();
            type_line(&controller, id, "run").await;
            controller.handle_key(id, Key::Enter).await.unwrap();
        }
        wait_idle(&controller, first).await;
        wait_idle(&controller, second).await;

        for session in controller.sessions().await {
            assert_eq!(session.history, ["run"]);
        }
    }

    #[tokio::test]
    async fn test_keys_to_unattached_session_are_rejected() {
        let (controller, _store) = controller_with(vec![]);
        let id = controller.create(None, Dialect::PosixBash, "/").await;
        assert!(matches!(
            controller.handle_key(id, Key::Char('x')).await,
            Err(EngineError::Detached(_))
        ));

        let surface = RecordingSurface::new();
        controller.attach(id, Box::new(surface)).await.unwrap();
        controller.handle_key(id, Key::Char('x')).await.unwrap();

        // closing detaches again
        controller.close(id).await.unwrap();
        assert!(matches!(
            controller.handle_key(id, Key::Char('y')).await,
            Err(EngineError::Detached(_))
        ));
    }

    #[tokio::test]
    async fn test_restore_comes_back_unattached() {
        let store = Arc::new(MemoryStore::new());
        {
            let executor = Arc::new(ScriptedExecutor::new(vec![]));
            let controller = SessionController::new(executor, store.clone());
            let id = controller
                .create(Some("build box"), Dialect::PosixZsh, "/srv")
                .await;
            let surface = RecordingSurface::new();
            controller.attach(id, Box::new(surface)).await.unwrap();
            controller.persist_now().await.unwrap();
        }

        let executor = Arc::new(ScriptedExecutor::new(vec![]));
        let controller = SessionController::new(executor, store);
        let restored = controller.restore().await.unwrap();
        assert_eq!(restored, 1);

        let sessions = controller.sessions().await;
        assert_eq!(sessions[0].title, "build box");
        assert_eq!(sessions[0].dialect, Dialect::PosixZsh);
        assert!(sessions[0].active);
        assert!(!sessions[0].attached);
        assert_eq!(controller.focused().await, None);
    }

    #[tokio::test]
    async fn test_debounced_persist_fires() {
        let (controller, store) = controller_with(vec![]);
        controller.create(None, Dialect::PosixBash, "/").await;
        assert!(store.snapshot().is_empty());
        tokio::time::sleep(PERSIST_DEBOUNCE + Duration::from_millis(100)).await;
        assert_eq!(store.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_probe_does_not_block_session() {
        let store = Arc::new(MemoryStore::new());
        let mut executor = ScriptedExecutor::new(vec![ScriptedExecutor::ok("ok\n", None)]);
        executor.probe_ok = false;
        let controller = SessionController::new(Arc::new(executor), store);

        let id = controller.create(None, Dialect::PosixBash, "/").await;
        let surface = RecordingSurface::new();
        controller.attach(id, Box::new(surface.clone())).await.unwrap();
        assert!(surface.rendered().contains("endpoint: unreachable"));

        type_line(&controller, id, "echo hi").await;
        controller.handle_key(id, Key::Enter).await.unwrap();
        wait_idle(&controller, id).await;
        let terminal = controller.get(id).await.unwrap();
        assert_eq!(
            terminal.lock().await.dispatch_state(),
            DispatchState::Succeeded
        );
    }
}
