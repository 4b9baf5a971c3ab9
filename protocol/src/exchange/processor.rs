//! # Transaction Processor
//!
//! The step every domain runs when a transaction reaches it:
//!
//! 1. Find the single leaf (the caller's position).
//! 2. Read the root Offer.
//! 3. Look up this domain's signer.
//! 4. If configured as a bad actor, rewrite the Offer's publisher domain.
//! 5. Pick a Bid from inventory (or Empty) and sign it against the root.
//! 6. Attach the new node under the leaf.
//! 7. Fan out to suppliers, if any.
//!
//! Steps 1-3 reject the request outright. Nothing is dispatched before they
//! pass, so a rejected transaction never reaches a supplier.
//!
//! The publisher side of an auction is [`TransactionProcessor::open_auction`]:
//! it signs a fresh Offer as the root and fans out from there.

use std::sync::Arc;

use rand::Rng;
use tracing::{debug, info, warn};

use super::domain::DomainConfig;
use super::fanout::{FanoutReport, SupplierFanout};
use super::transport::SupplierTransport;
use super::winner::{resolve_path, winning_bid};
use crate::config::BAD_ACTOR_PUB_DOMAIN;
use crate::error::ProtocolError;
use crate::payload::{Bid, Offer, Payload};
use crate::record::SignerRegistry;
use crate::tree::{encode_subtree, NodeId, TransactionTree};

/// Result of [`TransactionProcessor::process`].
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    /// The full tree as this domain saw it, root included.
    pub tree: TransactionTree,
    /// This domain's own node.
    pub node: NodeId,
    /// Present when the domain has suppliers.
    pub fanout: Option<FanoutReport>,
}

impl ProcessOutcome {
    /// This domain's node and everything under it, without ancestors. This
    /// is what goes back to the caller.
    pub fn response(&self) -> TransactionTree {
        self.tree.subtree(self.node)
    }

    /// The response, encoded for the wire.
    pub fn encode_response(&self) -> Result<Vec<u8>, ProtocolError> {
        encode_subtree(&self.tree, self.node)
    }

    /// The payload this domain contributed.
    pub fn contribution(&self) -> Result<Payload, ProtocolError> {
        Ok(Payload::resolve(self.tree.record(self.node))?)
    }
}

/// Result of [`TransactionProcessor::open_auction`].
#[derive(Debug, Clone)]
pub struct AuctionOutcome {
    pub tree: TransactionTree,
    /// Where the winner path ends.
    pub winner: NodeId,
    /// The winning Bid, if any branch produced one.
    pub bid: Option<Bid>,
    pub fanout: Option<FanoutReport>,
}

/// One domain's step function.
#[derive(Debug, Clone)]
pub struct TransactionProcessor {
    config: Arc<DomainConfig>,
    signers: SignerRegistry,
    fanout: SupplierFanout,
}

impl TransactionProcessor {
    pub fn new(
        config: DomainConfig,
        signers: SignerRegistry,
        transport: Arc<dyn SupplierTransport>,
    ) -> Self {
        let fanout = SupplierFanout::new(
            transport,
            config.supplier_timeout(),
            config.verify_responses,
        );
        Self {
            config: Arc::new(config),
            signers,
            fanout,
        }
    }

    pub fn config(&self) -> &DomainConfig {
        &self.config
    }

    pub fn domain(&self) -> &str {
        &self.config.host
    }

    /// Extends `incoming` with this domain's node and its suppliers'
    /// answers.
    pub async fn process<R: Rng + Send + ?Sized>(
        &self,
        mut tree: TransactionTree,
        rng: &mut R,
    ) -> Result<ProcessOutcome, ProtocolError> {
        let leaf = tree.leaf()?;
        let root = tree.root();

        let mut offer = Payload::offer(tree.record(root))
            .map_err(|e| ProtocolError::InvalidOffer(e.to_string()))?;
        let signer = self.signers.get(self.domain())?;

        if self.config.bad_actor {
            warn!(
                domain = self.domain(),
                original = %offer.pub_domain,
                rewritten = BAD_ACTOR_PUB_DOMAIN,
                "bad actor: rewriting publisher domain"
            );
            offer.pub_domain = BAD_ACTOR_PUB_DOMAIN.to_string();
            tree.record_mut(root).payload = Payload::Offer(offer.clone()).to_bytes()?;
        }

        let payload = self.select_payload(&offer, rng);
        let root_id = tree.record(root).id();
        let record = signer.create_signed(payload.to_bytes()?, Some(root_id))?;
        let node = tree.add_child(leaf, record)?;

        debug!(
            domain = self.domain(),
            kind = payload.kind(),
            depth = tree.depth(node),
            "contributed node"
        );

        let fanout = if self.config.suppliers.is_empty() {
            None
        } else {
            Some(
                self.fanout
                    .fan_out(signer.as_ref(), &self.config.suppliers, &mut tree, node, rng)
                    .await?,
            )
        };

        Ok(ProcessOutcome { tree, node, fanout })
    }

    /// Starts an auction for `offer`: signs it as the root, fans out to the
    /// suppliers and resolves the winner.
    pub async fn open_auction<R: Rng + Send + ?Sized>(
        &self,
        offer: Offer,
        rng: &mut R,
    ) -> Result<AuctionOutcome, ProtocolError> {
        let signer = self.signers.get(self.domain())?;
        let root = signer.create_signed(Payload::Offer(offer).to_bytes()?, None)?;
        let mut tree = TransactionTree::new(root);
        let root = tree.root();

        let fanout = if self.config.suppliers.is_empty() {
            None
        } else {
            Some(
                self.fanout
                    .fan_out(signer.as_ref(), &self.config.suppliers, &mut tree, root, rng)
                    .await?,
            )
        };

        let winner = resolve_path(&tree)?;
        let bid = winning_bid(&tree)?;
        info!(
            domain = self.domain(),
            nodes = tree.len(),
            winner = %tree.record(winner).domain,
            has_bid = bid.is_some(),
            "auction resolved"
        );
        Ok(AuctionOutcome {
            tree,
            winner,
            bid,
            fanout,
        })
    }

    /// A uniformly random advert the Offer has not stopped, or Empty.
    fn select_payload<R: Rng + ?Sized>(&self, offer: &Offer, rng: &mut R) -> Payload {
        let eligible: Vec<_> = self
            .config
            .adverts
            .iter()
            .filter(|advert| !offer.is_stopped(&advert.advertiser_url))
            .collect();

        if eligible.is_empty() {
            return Payload::Empty;
        }
        Payload::Bid(eligible[rng.gen_range(0..eligible.len())].to_bid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::DomainKeypair;
    use crate::exchange::domain::Advert;
    use crate::exchange::testing::{Reply, ScriptedTransport};
    use crate::record::{verify, verify_anchored, DomainSigner, RecordSigner, SignedRecord};
    use crate::tree::{decode, encode};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn signer(domain: &str, seed: u8) -> Arc<DomainSigner> {
        Arc::new(DomainSigner::new(domain, DomainKeypair::from_seed(&[seed; 32])))
    }

    fn registry(signers: &[Arc<DomainSigner>]) -> SignerRegistry {
        let mut reg = SignerRegistry::new();
        for s in signers {
            reg.register(s.clone());
        }
        reg
    }

    fn offer_tree(offer: Offer) -> TransactionTree {
        let publisher = signer("pub.example", 1);
        let root = publisher
            .create_signed(Payload::Offer(offer).to_bytes().unwrap(), None)
            .unwrap();
        TransactionTree::new(root)
    }

    fn processor(config: DomainConfig, transport: Arc<ScriptedTransport>) -> TransactionProcessor {
        let seed = config.host.len() as u8;
        let reg = registry(&[signer(&config.host, seed)]);
        TransactionProcessor::new(config, reg, transport)
    }

    #[tokio::test]
    async fn new_node_hangs_under_the_leaf() {
        let p = processor(DomainConfig::new("dsp.example"), Arc::new(ScriptedTransport::new()));
        let tree = offer_tree(Offer::new("pub.example", "banner"));
        let leaf = tree.leaf().unwrap();
        let mut rng = StdRng::seed_from_u64(3);

        let out = p.process(tree, &mut rng).await.unwrap();
        assert_eq!(out.tree.parent(out.node), Some(leaf));
        assert_eq!(out.contribution().unwrap(), Payload::Empty);
        assert!(out.fanout.is_none());

        let node = out.tree.record(out.node);
        assert!(verify_anchored(node, out.tree.record(out.tree.root())));
    }

    #[tokio::test]
    async fn stopped_advertiser_is_never_bid() {
        let config = DomainConfig::new("dsp.example").with_adverts(vec![
            Advert::new("adv-x.com", "adv-x.com/a.png"),
            Advert::new("adv-y.com", "adv-y.com/a.png"),
        ]);
        let p = processor(config, Arc::new(ScriptedTransport::new()));

        for seed in 0..32 {
            let mut offer = Offer::new("pub.example", "banner");
            offer.stopped = vec!["adv-x.com".into()];
            let mut rng = StdRng::seed_from_u64(seed);
            let out = p.process(offer_tree(offer), &mut rng).await.unwrap();
            match out.contribution().unwrap() {
                Payload::Bid(bid) => assert_eq!(bid.advertiser_url, "adv-y.com"),
                other => panic!("expected a bid, got {}", other.kind()),
            }
        }
    }

    #[tokio::test]
    async fn fully_stopped_inventory_yields_empty() {
        let config = DomainConfig::new("dsp.example")
            .with_adverts(vec![Advert::new("adv-x.com", "adv-x.com/a.png")]);
        let p = processor(config, Arc::new(ScriptedTransport::new()));
        let mut offer = Offer::new("pub.example", "banner");
        offer.stopped = vec!["https://adv-x.com/".into()];

        let mut rng = StdRng::seed_from_u64(0);
        let out = p.process(offer_tree(offer), &mut rng).await.unwrap();
        assert_eq!(out.contribution().unwrap(), Payload::Empty);
    }

    #[tokio::test]
    async fn two_leaves_rejected_without_dispatch() {
        let transport = Arc::new(ScriptedTransport::new());
        let config = DomainConfig::new("ssp.example").with_suppliers(["dsp.example"]);
        let p = processor(config, transport.clone());

        let mut tree = offer_tree(Offer::new("pub.example", "banner"));
        let root_id = tree.record(tree.root()).id();
        let other = signer("other.example", 9);
        for _ in 0..2 {
            let r = other
                .create_signed(Payload::Empty.to_bytes().unwrap(), Some(root_id))
                .unwrap();
            tree.add_child(tree.root(), r).unwrap();
        }

        let mut rng = StdRng::seed_from_u64(0);
        let err = p.process(tree, &mut rng).await.unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedTransaction(_)));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn non_offer_root_is_invalid() {
        let p = processor(DomainConfig::new("dsp.example"), Arc::new(ScriptedTransport::new()));
        let root = signer("pub.example", 1)
            .create_signed(Payload::Empty.to_bytes().unwrap(), None)
            .unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let err = p.process(TransactionTree::new(root), &mut rng).await.unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidOffer(_)));
    }

    #[tokio::test]
    async fn unregistered_domain_cannot_sign() {
        let p = TransactionProcessor::new(
            DomainConfig::new("dsp.example"),
            SignerRegistry::new(),
            Arc::new(ScriptedTransport::new()),
        );
        let mut rng = StdRng::seed_from_u64(0);
        let err = p
            .process(offer_tree(Offer::new("pub.example", "banner")), &mut rng)
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::SigningUnavailable(d) if d == "dsp.example"));
    }

    #[tokio::test]
    async fn suppliers_receive_the_full_tree() {
        let transport = Arc::new(ScriptedTransport::new().reply("dsp.example", Reply::Status(503)));
        let config = DomainConfig::new("ssp.example").with_suppliers(["dsp.example"]);
        let p = processor(config, transport.clone());

        let tree = offer_tree(Offer::new("pub.example", "banner"));
        let mut rng = StdRng::seed_from_u64(0);
        let out = p.process(tree, &mut rng).await.unwrap();

        let bodies = transport.bodies();
        assert_eq!(bodies.len(), 1);
        let sent = decode(&bodies[0].1).unwrap();
        assert_eq!(sent.record(sent.root()).domain, "pub.example");
        assert_eq!(sent.len(), 2);

        // The response excludes the publisher root.
        let response = out.response();
        assert_eq!(response.record(response.root()).domain, "ssp.example");
        assert_eq!(response.children(response.root()).len(), 1);
        assert_eq!(decode(&out.encode_response().unwrap()).unwrap(), response);
    }

    #[tokio::test]
    async fn bad_actor_rewrites_offer_and_breaks_root_signature() {
        let mut config = DomainConfig::new("ssp.example");
        config.bad_actor = true;
        let p = processor(config, Arc::new(ScriptedTransport::new()));

        let tree = offer_tree(Offer::new("pub.example", "banner"));
        assert!(verify(tree.record(tree.root())));

        let mut rng = StdRng::seed_from_u64(0);
        let out = p.process(tree, &mut rng).await.unwrap();
        let root: &SignedRecord = out.tree.record(out.tree.root());
        let offer = Payload::offer(root).unwrap();
        assert_eq!(offer.pub_domain, BAD_ACTOR_PUB_DOMAIN);
        assert!(!verify(root));
        // Its own node is still validly bound to the tree it forwarded.
        assert!(verify_anchored(out.tree.record(out.node), root));
    }

    #[tokio::test]
    async fn open_auction_picks_the_bidding_branch() {
        let publisher = signer("pub.example", 1);

        // Responses must be anchored to the root the publisher will sign, so
        // they are produced by processors fed the request body.
        let bid_side = processor(
            DomainConfig::new("dsp-a.example")
                .with_adverts(vec![Advert::new("adv.example", "adv.example/a.png")]),
            Arc::new(ScriptedTransport::new()),
        );
        let empty_side = processor(DomainConfig::new("dsp-b.example"), Arc::new(ScriptedTransport::new()));

        let config = DomainConfig::new("pub.example").with_suppliers(["dsp-a.example", "dsp-b.example"]);
        let loopback = Arc::new(Loopback {
            sides: vec![
                ("dsp-a.example".into(), bid_side),
                ("dsp-b.example".into(), empty_side),
            ],
        });
        let p = TransactionProcessor::new(config, registry(&[publisher]), loopback);

        let mut rng = StdRng::seed_from_u64(11);
        let out = p
            .open_auction(Offer::new("pub.example", "banner"), &mut rng)
            .await
            .unwrap();
        assert_eq!(out.tree.children(out.tree.root()).len(), 2);
        assert_eq!(out.tree.selection(out.tree.root()), Some(0));
        assert_eq!(out.tree.record(out.winner).domain, "dsp-a.example");
        assert_eq!(out.bid.unwrap().advertiser_url, "adv.example");

        let reencoded = decode(&encode(&out.tree).unwrap()).unwrap();
        assert_eq!(resolve_path(&reencoded).unwrap().index(), out.winner.index());
    }

    /// Hands each request straight to an in-process processor.
    struct Loopback {
        sides: Vec<(String, TransactionProcessor)>,
    }

    #[async_trait::async_trait]
    impl SupplierTransport for Loopback {
        async fn post_transaction(
            &self,
            supplier: &str,
            body: Vec<u8>,
        ) -> Result<Vec<u8>, ProtocolError> {
            let (_, side) = self
                .sides
                .iter()
                .find(|(host, _)| host == supplier)
                .ok_or_else(|| ProtocolError::SupplierFailure {
                    host: supplier.into(),
                    reason: "404".into(),
                })?;
            let tree = decode(&body)?;
            let mut rng = StdRng::seed_from_u64(5);
            side.process(tree, &mut rng).await?.encode_response()
        }
    }
}
