use std::{
    io,
    thread::{self, JoinHandle},
};

use crossbeam_channel::{Receiver, Select, Sender, bounded, unbounded};

use crate::command::{AlertCommand, CreateCommand, QueryCommand, Request, TransferCommand};

use super::RequestProcessor;

/// Sending halves of the four per-kind inboxes.
///
/// Dropping this disconnects the serializer, which then stops.
#[derive(Debug)]
pub struct Inboxes {
    create: Sender<CreateCommand>,
    query: Sender<QueryCommand>,
    transfer: Sender<TransferCommand>,
    alert: Sender<AlertCommand>,
}

impl Inboxes {
    /// Routes the envelope to the inbox of its kind. Hands it back if the
    /// serializer is gone.
    pub fn submit(&self, request: Request) -> Result<(), Request> {
        match request {
            Request::Create(command) => self
                .create
                .send(command)
                .map_err(|err| Request::Create(err.into_inner())),
            Request::Query(command) => self
                .query
                .send(command)
                .map_err(|err| Request::Query(err.into_inner())),
            Request::Transfer(command) => self
                .transfer
                .send(command)
                .map_err(|err| Request::Transfer(err.into_inner())),
            Request::Alert(command) => self
                .alert
                .send(command)
                .map_err(|err| Request::Alert(err.into_inner())),
        }
    }
}

/// The single thread of control that owns a [`RequestProcessor`].
pub struct Serializer<P> {
    processor: P,
    create: Receiver<CreateCommand>,
    query: Receiver<QueryCommand>,
    transfer: Receiver<TransferCommand>,
    alert: Receiver<AlertCommand>,
}

fn channel<T>(capacity: Option<usize>) -> (Sender<T>, Receiver<T>) {
    match capacity {
        Some(capacity) => bounded(capacity),
        None => unbounded(),
    }
}

impl<P> Serializer<P>
where
    P: RequestProcessor,
{
    /// `capacity` bounds each inbox; `None` leaves them unbounded.
    pub fn new(processor: P, capacity: Option<usize>) -> (Self, Inboxes) {
        let (create_tx, create) = channel(capacity);
        let (query_tx, query) = channel(capacity);
        let (transfer_tx, transfer) = channel(capacity);
        let (alert_tx, alert) = channel(capacity);
        let serializer = Self {
            processor,
            create,
            query,
            transfer,
            alert,
        };
        let inboxes = Inboxes {
            create: create_tx,
            query: query_tx,
            transfer: transfer_tx,
            alert: alert_tx,
        };
        (serializer, inboxes)
    }

    pub fn spawn(self, thread_name: String) -> io::Result<JoinHandle<P>>
    where
        P: Send + 'static,
    {
        thread::Builder::new()
            .name(thread_name)
            .spawn(move || self.run())
    }

    /// Serves requests one at a time until every inbox is disconnected and
    /// drained, then returns the processor with whatever is still parked in it.
    ///
    /// When several inboxes are ready, [`Select`] picks one of them at random,
    /// so no request kind can starve the others.
    pub fn run(mut self) -> P {
        tracing::info!("Serializer started");
        let mut select = Select::new();
        let create = select.recv(&self.create);
        let query = select.recv(&self.query);
        let transfer = select.recv(&self.transfer);
        let alert = select.recv(&self.alert);

        let mut connected = 4;
        while connected > 0 {
            let oper = select.select();
            let idx = oper.index();
            let request = match idx {
                idx if idx == create => oper.recv(&self.create).map(Request::Create),
                idx if idx == query => oper.recv(&self.query).map(Request::Query),
                idx if idx == transfer => oper.recv(&self.transfer).map(Request::Transfer),
                idx if idx == alert => oper.recv(&self.alert).map(Request::Alert),
                _ => unreachable!("only four operations are registered"),
            };
            let Ok(request) = request else {
                // disconnected and drained; keep serving the other inboxes
                select.remove(idx);
                connected -= 1;
                continue;
            };
            tracing::trace!(kind = ?request.kind(), "request selected");
            self.processor.process(request);
        }
        tracing::info!("Serializer stopped");
        drop(select);
        self.processor
    }
}
