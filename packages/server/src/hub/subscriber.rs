//! Subscriber: one connected peer and its two pumps.
//!
//! The connection is split once. The write pump is the only task that writes
//! to it and the read pump is the only task that reads from it, so the
//! socket itself needs no lock.

use std::{fmt::Display, time::Duration};

use axum::extract::ws::{self, Utf8Bytes, WebSocket};
use bytes::Bytes;
use futures_util::{
    sink::{Sink, SinkExt},
    stream::{SplitSink, SplitStream, Stream, StreamExt},
};
use tokio::{
    sync::mpsc,
    time::{Instant, MissedTickBehavior, interval_at, timeout, timeout_at},
};
use tracing::Instrument;

use super::hub::{Hub, SubscriberId};
use crate::domain::{Message, MessageKind, PeerError};

/// Time allowed to write one frame to the peer.
pub const WRITE_WAIT: Duration = Duration::from_secs(10);

/// Time allowed between two Pongs from the peer.
pub const PONG_WAIT: Duration = Duration::from_secs(60);

/// Keepalive Ping interval. Must be shorter than [`PONG_WAIT`].
pub const PING_PERIOD: Duration = Duration::from_secs(PONG_WAIT.as_secs() * 9 / 10);

/// Largest inbound frame accepted from a peer.
pub const MAX_MESSAGE_SIZE: usize = 512 * 1024;

/// A peer attached to one hub.
pub struct Subscriber<W, R> {
    hub: Hub,
    sink: W,
    stream: R,
}

impl Subscriber<SplitSink<WebSocket, ws::Message>, SplitStream<WebSocket>> {
    /// Bind an upgraded WebSocket to `hub`.
    pub fn new(hub: Hub, socket: WebSocket) -> Self {
        let (sink, stream) = socket.split();
        Self::from_parts(hub, sink, stream)
    }
}

impl<W, R, E> Subscriber<W, R>
where
    W: Sink<ws::Message> + Unpin + Send + 'static,
    W::Error: Display,
    R: Stream<Item = Result<ws::Message, E>> + Unpin + Send + 'static,
    E: Display + Send + 'static,
{
    /// Bind an already split connection to `hub`.
    pub fn from_parts(hub: Hub, sink: W, stream: R) -> Self {
        Self { hub, sink, stream }
    }

    /// Register with the hub, run both pumps and return once the connection
    /// is torn down.
    pub async fn run(self) {
        let registration = self.hub.register();
        self.attach(registration, Vec::new()).await;
    }

    /// Serve a registration taken earlier with [`Hub::register`].
    ///
    /// `preamble` is written to the peer first. Messages broadcast since the
    /// registration wait in the outbound queue and follow it.
    pub(crate) async fn attach(
        self,
        registration: Option<(SubscriberId, mpsc::Receiver<Message>)>,
        preamble: Vec<Message>,
    ) {
        let Self {
            hub,
            mut sink,
            stream,
        } = self;

        let Some((id, outbound)) = registration else {
            tracing::debug!(hub = %hub.name(), "hub stopped, closing new connection");
            let _ = write_frame(&mut sink, ws::Message::Close(None)).await;
            let _ = timeout(WRITE_WAIT, sink.close()).await;
            return;
        };

        let span = tracing::debug_span!("subscriber", hub = %hub.name(), subscriber = %id);

        let frames = preamble.len();
        for message in preamble {
            if let Err(e) = write_frame(&mut sink, message.into()).await {
                tracing::warn!(parent: &span, error = %e, "failed to send preamble");
                hub.unregister(id);
                let _ = timeout(WRITE_WAIT, sink.close()).await;
                return;
            }
        }
        if frames > 0 {
            tracing::debug!(parent: &span, frames, "sent preamble");
        }

        let mut reader = tokio::spawn(read_pump(hub.clone(), id, stream).instrument(span.clone()));
        let mut writer = tokio::spawn(write_pump(sink, outbound).instrument(span));

        tokio::select! {
            _ = &mut writer => {
                // Nobody is writing any more; stop reading and leave the hub
                reader.abort();
                hub.unregister(id);
            }
            _ = &mut reader => {
                // The read pump has unregistered; the hub closes the queue and
                // the write pump exits after sending Close
                let _ = writer.await;
            }
        }
    }
}

impl From<Message> for ws::Message {
    fn from(message: Message) -> Self {
        let (kind, data) = message.into_parts();
        match kind {
            MessageKind::Binary => ws::Message::Binary(data),
            MessageKind::Text => match Utf8Bytes::try_from(data.clone()) {
                Ok(text) => ws::Message::Text(text),
                Err(_) => {
                    tracing::warn!(size = data.len(), "text message is not UTF-8, sending binary frame");
                    ws::Message::Binary(data)
                }
            },
        }
    }
}

async fn write_pump<W>(mut sink: W, outbound: mpsc::Receiver<Message>)
where
    W: Sink<ws::Message> + Unpin,
    W::Error: Display,
{
    match write_loop(&mut sink, outbound).await {
        Ok(()) => tracing::debug!("outbound queue closed, sent close frame"),
        Err(e) => tracing::debug!(error = %e, "write pump stopped"),
    }
    let _ = timeout(WRITE_WAIT, sink.close()).await;
}

async fn write_loop<W>(sink: &mut W, mut outbound: mpsc::Receiver<Message>) -> Result<(), PeerError>
where
    W: Sink<ws::Message> + Unpin,
    W::Error: Display,
{
    let mut keepalive = interval_at(Instant::now() + PING_PERIOD, PING_PERIOD);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            message = outbound.recv() => match message {
                Some(message) => write_frame(sink, message.into()).await?,
                None => {
                    write_frame(sink, ws::Message::Close(None)).await?;
                    return Ok(());
                }
            },
            _ = keepalive.tick() => {
                write_frame(sink, ws::Message::Ping(Bytes::new())).await?;
            }
        }
    }
}

async fn write_frame<W>(sink: &mut W, frame: ws::Message) -> Result<(), PeerError>
where
    W: Sink<ws::Message> + Unpin,
    W::Error: Display,
{
    match timeout(WRITE_WAIT, sink.send(frame)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(PeerError::Socket(e.to_string())),
        Err(_) => Err(PeerError::WriteTimeout(WRITE_WAIT)),
    }
}

async fn read_pump<R, E>(hub: Hub, id: SubscriberId, mut stream: R)
where
    R: Stream<Item = Result<ws::Message, E>> + Unpin,
    E: Display,
{
    match read_loop(&mut stream).await {
        Ok(()) => tracing::debug!("peer closed connection"),
        Err(e) => tracing::debug!(error = %e, "read pump stopped"),
    }
    hub.unregister(id);
}

async fn read_loop<R, E>(stream: &mut R) -> Result<(), PeerError>
where
    R: Stream<Item = Result<ws::Message, E>> + Unpin,
    E: Display,
{
    let mut deadline = Instant::now() + PONG_WAIT;

    loop {
        let frame = match timeout_at(deadline, stream.next()).await {
            Err(_) => return Err(PeerError::ReadTimeout(PONG_WAIT)),
            Ok(None) => return Ok(()),
            Ok(Some(Err(e))) => return Err(PeerError::Socket(e.to_string())),
            Ok(Some(Ok(frame))) => frame,
        };

        let size = frame_len(&frame);
        if size > MAX_MESSAGE_SIZE {
            return Err(PeerError::FrameTooLarge {
                size,
                limit: MAX_MESSAGE_SIZE,
            });
        }

        match frame {
            ws::Message::Pong(_) => deadline = Instant::now() + PONG_WAIT,
            ws::Message::Close(_) => return Ok(()),
            // subscribers are read-only peers
            _ => {}
        }
    }
}

fn frame_len(frame: &ws::Message) -> usize {
    match frame {
        ws::Message::Text(text) => text.as_str().len(),
        ws::Message::Binary(data) | ws::Message::Ping(data) | ws::Message::Pong(data) => data.len(),
        ws::Message::Close(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        pin::Pin,
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
    };
    use tokio::{sync::watch, task::JoinHandle, time::sleep};

    use crate::hub::SEND_BUFFER;

    type TestSink = Pin<Box<dyn Sink<ws::Message, Error = String> + Send>>;
    type TestStream = Pin<Box<dyn Stream<Item = Result<ws::Message, String>> + Send>>;

    const WAIT: Duration = Duration::from_secs(5);

    /// The remote end of an in-memory connection.
    struct Peer {
        /// Frames the peer sends to the server
        inbound: mpsc::UnboundedSender<Result<ws::Message, String>>,
        /// Frames the server wrote to the peer
        written: mpsc::UnboundedReceiver<ws::Message>,
    }

    /// Bind `hub` to an in-memory connection. Writes stall while `gate` is
    /// shut.
    fn subscriber(hub: &Hub, gate: watch::Receiver<bool>) -> (Subscriber<TestSink, TestStream>, Peer) {
        let (written_tx, written) = mpsc::unbounded_channel::<ws::Message>();
        let (inbound, inbound_rx) = mpsc::unbounded_channel::<Result<ws::Message, String>>();

        let sink: TestSink = Box::pin(futures_util::sink::unfold(
            (written_tx, gate),
            |(tx, mut gate), frame: ws::Message| async move {
                let _ = gate.wait_for(|open| *open).await;
                tx.send(frame).map_err(|_| "peer gone".to_string())?;
                Ok::<_, String>((tx, gate))
            },
        ));
        let stream: TestStream = Box::pin(futures_util::stream::unfold(
            inbound_rx,
            |mut rx| async move { rx.recv().await.map(|item| (item, rx)) },
        ));

        (
            Subscriber::from_parts(hub.clone(), sink, stream),
            Peer { inbound, written },
        )
    }

    fn connect(hub: &Hub) -> (JoinHandle<()>, Peer) {
        let (_open, gate) = watch::channel(true);
        let (subscriber, peer) = subscriber(hub, gate);
        (tokio::spawn(subscriber.run()), peer)
    }

    async fn wait_for_count(hub: &Hub, expected: usize) {
        let mut count = hub.watch_client_count();
        timeout(WAIT, count.wait_for(|c| *c == expected))
            .await
            .expect("timed out waiting for client count")
            .expect("hub dropped");
    }

    async fn next_frame(peer: &mut Peer) -> ws::Message {
        timeout(WAIT, peer.written.recv())
            .await
            .expect("timed out waiting for frame")
            .expect("connection closed")
    }

    #[test]
    fn test_ping_period_is_shorter_than_pong_wait() {
        // テスト項目: Ping 間隔は PONG_WAIT の 9/10（54 秒）
        assert_eq!(PING_PERIOD, Duration::from_secs(54));
        assert!(PING_PERIOD < PONG_WAIT);
    }

    #[test]
    fn test_message_into_ws_frame() {
        // テスト項目: メッセージ種別に応じたフレームに変換される
        assert_eq!(
            ws::Message::from(Message::text("hi")),
            ws::Message::Text("hi".into())
        );
        assert_eq!(
            ws::Message::from(Message::binary(vec![1u8, 2, 3])),
            ws::Message::Binary(Bytes::from_static(&[1, 2, 3]))
        );
        // UTF-8 でない Text はバイナリとして送られる
        assert_eq!(
            ws::Message::from(Message::text(vec![0xffu8, 0xfe])),
            ws::Message::Binary(Bytes::from_static(&[0xff, 0xfe]))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_subscriber_receives_text_frame() {
        // テスト項目: 1 人の購読者に Text "hi" を送ると Text フレームが 1 つ届く
        // given (前提条件):
        let hub = Hub::new("status");
        hub.start();
        let (_handle, mut peer) = connect(&hub);
        wait_for_count(&hub, 1).await;

        // when (操作):
        hub.broadcast(Message::text("hi"));

        // then (期待する結果):
        assert_eq!(next_frame(&mut peer).await, ws::Message::Text("hi".into()));
        assert!(peer.written.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_binary_broadcast_writes_binary_frames_in_order() {
        // テスト項目: バイナリメッセージがブロードキャスト順に Binary フレームとして届く
        // given (前提条件):
        let hub = Hub::new("camera");
        hub.start();
        let (_handle, mut peer) = connect(&hub);
        wait_for_count(&hub, 1).await;

        // when (操作):
        for i in 0u8..10 {
            hub.broadcast_binary(vec![i; 4]);
        }

        // then (期待する結果):
        for i in 0u8..10 {
            assert_eq!(
                next_frame(&mut peer).await,
                ws::Message::Binary(Bytes::from(vec![i; 4]))
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_preamble_precedes_queued_broadcasts() {
        // テスト項目: attach はプリアンブルを先に書き、登録後に溜まったブロードキャストがそれに続く
        // given (前提条件): 登録済みで、接続前にブロードキャストがキューに届いている
        let hub = Hub::new("logs");
        hub.start();
        let registration = hub.register();
        wait_for_count(&hub, 1).await;
        assert!(hub.broadcast(Message::text("live")));

        // when (操作):
        let (_open, gate) = watch::channel(true);
        let (subscriber, mut peer) = subscriber(&hub, gate);
        let preamble = vec![Message::text("history 1"), Message::text("history 2")];
        let _handle = tokio::spawn(subscriber.attach(registration, preamble));

        // then (期待する結果):
        for expected in ["history 1", "history 2", "live"] {
            assert_eq!(next_frame(&mut peer).await, ws::Message::Text(expected.into()));
        }
        assert_eq!(hub.client_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_socket_is_evicted_and_closed() {
        // テスト項目: 書き込みが進まない購読者は送信キュー溢れで削除され、滞留分と Close を書いて run が終了する
        // given (前提条件): 書き込みが完了しないピア
        let hub = Hub::new("camera");
        hub.start();
        let (open, gate) = watch::channel(false);
        let (subscriber, mut peer) = subscriber(&hub, gate);
        let handle = tokio::spawn(subscriber.run());
        wait_for_count(&hub, 1).await;

        // when (操作): 送信キューの容量を超えてブロードキャストする
        for i in 0..SEND_BUFFER + 8 {
            hub.broadcast_binary(vec![i as u8]);
            tokio::task::yield_now().await;
        }

        // then (期待する結果): WRITE_WAIT を待たずに削除される
        wait_for_count(&hub, 0).await;
        assert!(peer.written.try_recv().is_err());

        // 書き込みが再開すると滞留分の後に Close が届き、run が終了する
        open.send_replace(true);
        timeout(WAIT, handle).await.unwrap().unwrap();
        let mut frames = Vec::new();
        while let Ok(frame) = peer.written.try_recv() {
            frames.push(frame);
        }
        assert!(frames.len() > SEND_BUFFER);
        let (close, queued) = frames.split_last().unwrap();
        assert_eq!(close, &ws::Message::Close(None));
        assert!(queued.iter().all(|frame| matches!(frame, ws::Message::Binary(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_peer_disconnect_unregisters_and_closes() {
        // テスト項目: ピアが切断すると登録解除され、Close フレームを送って run が終了する
        // given (前提条件):
        let hub = Hub::new("logs");
        hub.start();
        let (handle, peer) = connect(&hub);
        wait_for_count(&hub, 1).await;

        // when (操作): ピア側のストリームを閉じる
        let Peer {
            inbound,
            mut written,
        } = peer;
        drop(inbound);

        // then (期待する結果):
        wait_for_count(&hub, 0).await;
        let frame = timeout(WAIT, written.recv()).await.unwrap();
        assert_eq!(frame, Some(ws::Message::Close(None)));
        timeout(WAIT, handle).await.unwrap().unwrap();

        // 削除後のブロードキャストはソケットに書き込まれない
        hub.broadcast(Message::text("after removal"));
        assert!(timeout(WAIT, written.recv()).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_peer_close_frame_unregisters() {
        // テスト項目: ピアから Close フレームを受けると登録解除される
        let hub = Hub::new("logs");
        hub.start();
        let (handle, mut peer) = connect(&hub);
        wait_for_count(&hub, 1).await;

        peer.inbound.send(Ok(ws::Message::Close(None))).unwrap();

        wait_for_count(&hub, 0).await;
        assert_eq!(next_frame(&mut peer).await, ws::Message::Close(None));
        timeout(WAIT, handle).await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_inbound_frame_tears_down() {
        // テスト項目: MAX_MESSAGE_SIZE + 1 バイトの受信で購読者が切断される
        // given (前提条件):
        let hub = Hub::new("logs");
        hub.start();
        let (handle, mut peer) = connect(&hub);
        wait_for_count(&hub, 1).await;

        // when (操作):
        let oversized = Bytes::from(vec![0u8; MAX_MESSAGE_SIZE + 1]);
        peer.inbound.send(Ok(ws::Message::Binary(oversized))).unwrap();

        // then (期待する結果):
        wait_for_count(&hub, 0).await;
        assert_eq!(next_frame(&mut peer).await, ws::Message::Close(None));
        timeout(WAIT, handle).await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_inbound_payloads_are_discarded() {
        // テスト項目: 上限以下の受信データは破棄され、接続は維持される
        let hub = Hub::new("logs");
        hub.start();
        let (_handle, mut peer) = connect(&hub);
        wait_for_count(&hub, 1).await;

        peer.inbound
            .send(Ok(ws::Message::Text("hello server".into())))
            .unwrap();
        peer.inbound
            .send(Ok(ws::Message::Binary(Bytes::from(vec![0u8; MAX_MESSAGE_SIZE]))))
            .unwrap();
        hub.broadcast(Message::text("still subscribed"));

        assert_eq!(
            next_frame(&mut peer).await,
            ws::Message::Text("still subscribed".into())
        );
        assert_eq!(hub.client_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_keeps_responsive_peer_registered() {
        // テスト項目: Ping に Pong で応答し続ける購読者は 3 分間登録されたまま
        // given (前提条件): Ping を受けたら Pong を返すピア
        let hub = Hub::new("status");
        hub.start();
        let (_handle, peer) = connect(&hub);
        wait_for_count(&hub, 1).await;

        let pings = Arc::new(AtomicUsize::new(0));
        let Peer {
            inbound,
            mut written,
        } = peer;
        let responder = {
            let pings = pings.clone();
            tokio::spawn(async move {
                while let Some(frame) = written.recv().await {
                    if let ws::Message::Ping(payload) = frame {
                        pings.fetch_add(1, Ordering::SeqCst);
                        if inbound.send(Ok(ws::Message::Pong(payload))).is_err() {
                            break;
                        }
                    }
                }
            })
        };

        // when (操作) / then (期待する結果): 10 秒ごとに 3 分間確認する
        for _ in 0..18 {
            sleep(Duration::from_secs(10)).await;
            assert_eq!(hub.client_count(), 1);
        }
        assert!(pings.load(Ordering::SeqCst) >= 3);
        responder.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_peer_is_removed_after_pong_wait() {
        // テスト項目: Pong を返さないピアは PONG_WAIT 経過後、PONG_WAIT + WRITE_WAIT 以内に削除される
        // given (前提条件):
        let hub = Hub::new("status");
        hub.start();
        let (handle, mut peer) = connect(&hub);
        wait_for_count(&hub, 1).await;

        // when (操作):
        sleep(PONG_WAIT - Duration::from_secs(1)).await;
        assert_eq!(hub.client_count(), 1);
        sleep(Duration::from_secs(1) + WRITE_WAIT).await;

        // then (期待する結果):
        assert_eq!(hub.client_count(), 0);
        timeout(WAIT, handle).await.unwrap().unwrap();

        let mut frames = Vec::new();
        while let Ok(frame) = peer.written.try_recv() {
            frames.push(frame);
        }
        assert_eq!(frames.first(), Some(&ws::Message::Ping(Bytes::new())));
        assert_eq!(frames.last(), Some(&ws::Message::Close(None)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_hub_closes_new_connection() {
        // テスト項目: 停止済みの Hub に接続すると即座に Close が送られる
        let hub = Hub::new("camera");
        hub.stop();

        let (handle, mut peer) = connect(&hub);

        assert_eq!(next_frame(&mut peer).await, ws::Message::Close(None));
        timeout(WAIT, handle).await.unwrap().unwrap();
        assert_eq!(hub.client_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hub_stop_closes_registered_connection() {
        // テスト項目: Hub の stop で登録済みの購読者に Close が送られ run が終了する
        let hub = Hub::new("status");
        hub.start();
        let (handle, mut peer) = connect(&hub);
        wait_for_count(&hub, 1).await;

        hub.stop();

        assert_eq!(next_frame(&mut peer).await, ws::Message::Close(None));
        timeout(WAIT, handle).await.unwrap().unwrap();
    }
}
