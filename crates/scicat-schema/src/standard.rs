//! The sciunit / neuronunit schema: runtime hierarchy plus catalog classes.

use std::sync::Arc;

use crate::catalog::Catalog;
use crate::class::ClassDef;
use crate::context::ContextId;
use crate::descriptor::ClassDescriptor;
use crate::error::SchemaResult;
use crate::factory::{ClassFactory, MirroredClasses};
use crate::model::ModelFamily;
use crate::namespace::NamespaceManager;
use crate::resolver::ClassResolver;
use crate::runtime::{ClassHandle, FamilyRoots, RuntimeClass, RuntimeRegistry};
use crate::vocab::*;

pub const LEMS_LOCATOR: &str = "LEMS_file_path_or_url";

// Runtime modules
pub const MOD_BASE: &str = "sciunit.base";
pub const MOD_MODELS: &str = "sciunit.models.base";
pub const MOD_RUNNABLE: &str = "sciunit.models.runnable";
pub const MOD_CAPABILITIES: &str = "sciunit.capabilities";
pub const MOD_TESTS: &str = "sciunit.tests";
pub const MOD_NU_CAPABILITIES: &str = "neuronunit.capabilities";
pub const MOD_NU_LEMS: &str = "neuronunit.models.lems";
pub const MOD_NU_CHANNEL: &str = "neuronunit.models.channel";
pub const MOD_NU_REDUCED: &str = "neuronunit.models.reduced";
pub const MOD_NU_TESTS: &str = "neuronunit.tests";
pub const MOD_NU_DRUCKMANN2013: &str = "neuronunit.tests.druckman2013";

/// Base of the Druckmann et al. (2013) feature tests.
pub const DRUCKMANN2013_BASE: &str = "Druckmann2013Test";

/// The Druckmann et al. (2013) feature tests, mirrored in this order.
pub const DRUCKMANN2013_TESTS: &[&str] = &[
    "AP12AmplitudeDropTest",
    "AP1SSAmplitudeChangeTest",
    "AP1AmplitudeTest",
    "AP1WidthHalfHeightTest",
    "AP1WidthPeakToTroughTest",
    "AP1RateOfChangePeakToTroughTest",
    "AP1AHPDepthTest",
    "AP2AmplitudeTest",
    "AP2WidthHalfHeightTest",
    "AP2WidthPeakToTroughTest",
    "AP2RateOfChangePeakToTroughTest",
    "AP2AHPDepthTest",
    "AP12AmplitudeChangePercentTest",
    "AP12HalfWidthChangePercentTest",
    "AP12RateOfChangePeakToTroughPercentChangeTest",
    "AP12AHPDepthPercentChangeTest",
    "InputResistanceTest",
    "AP1DelayMeanTest",
    "AP1DelaySDTest",
    "AP2DelayMeanTest",
    "AP2DelaySDTest",
    "Burst1ISIMeanTest",
    "Burst1ISISDTest",
    "InitialAccommodationMeanTest",
    "SSAccommodationMeanTest",
    "AccommodationRateToSSTest",
    "AccommodationAtSSMeanTest",
    "AccommodationRateMeanAtSSTest",
    "ISICVTest",
    "ISIMedianTest",
    "ISIBurstMeanChangeTest",
    "SpikeRateStrongStimTest",
    "AP1DelayMeanStrongStimTest",
    "AP1DelaySDStrongStimTest",
    "AP2DelayMeanStrongStimTest",
    "AP2DelaySDStrongStimTest",
    "Burst1ISIMeanStrongStimTest",
    "Burst1ISISDStrongStimTest",
];

/// Handles to the two schema contexts after [`StandardSchema::install`].
#[derive(Debug, Clone, Copy)]
pub struct StandardSchema {
    pub sciunit: ContextId,
    pub neuronunit: ContextId,
}

impl StandardSchema {
    /// Register the runtime classes and return the family roots.
    pub fn register_runtime(registry: &RuntimeRegistry) -> FamilyRoots {
        let d = ClassDescriptor::new;
        let sciunit = d(MOD_BASE, "SciUnit");
        let model = d(MOD_MODELS, "Model");
        let capability = d(MOD_CAPABILITIES, "Capability");
        let runnable = d(MOD_CAPABILITIES, "Runnable");
        let runnable_model = d(MOD_RUNNABLE, "RunnableModel");
        let membrane = d(MOD_NU_CAPABILITIES, "ProducesMembranePotential");
        let spikes = d(MOD_NU_CAPABILITIES, "ProducesActionPotentials");
        let square = d(MOD_NU_CAPABILITIES, "ReceivesSquareCurrent");
        let temperature = d(MOD_NU_CAPABILITIES, "SupportsSettingTemperature");
        let lems = d(MOD_NU_LEMS, "LEMSModel");
        let test = d(MOD_TESTS, "Test");
        let protocol = d(MOD_NU_TESTS, "ProtocolToFeaturesTest");

        registry.register(RuntimeClass::new(MOD_BASE, "SciUnit"));
        registry.register(RuntimeClass::new(MOD_MODELS, "Model").with_base(sciunit.clone()));
        registry.register(RuntimeClass::new(MOD_CAPABILITIES, "Capability").with_base(sciunit.clone()));
        registry.register(RuntimeClass::new(MOD_CAPABILITIES, "Runnable").with_base(capability.clone()));
        registry.register(
            RuntimeClass::new(MOD_RUNNABLE, "RunnableModel").with_bases([model.clone(), runnable]),
        );

        registry.register(
            RuntimeClass::new(MOD_NU_CAPABILITIES, "ProducesMembranePotential")
                .with_base(capability.clone()),
        );
        registry.register(
            RuntimeClass::new(MOD_NU_CAPABILITIES, "ProducesActionPotentials").with_base(membrane),
        );
        registry.register(
            RuntimeClass::new(MOD_NU_CAPABILITIES, "ReceivesSquareCurrent").with_base(capability.clone()),
        );
        registry.register(
            RuntimeClass::new(MOD_NU_CAPABILITIES, "SupportsSettingTemperature")
                .with_base(capability.clone()),
        );

        registry.register(
            RuntimeClass::new(MOD_NU_LEMS, "LEMSModel")
                .with_base(runnable_model)
                .with_positional(LEMS_LOCATOR),
        );
        registry.register(
            RuntimeClass::new(MOD_NU_CHANNEL, "ChannelModel")
                .with_bases([lems.clone(), temperature])
                .with_positional(LEMS_LOCATOR),
        );
        registry.register(
            RuntimeClass::new(MOD_NU_REDUCED, "ReducedModel")
                .with_bases([lems, square, spikes])
                .with_positional(LEMS_LOCATOR),
        );

        registry.register(RuntimeClass::new(MOD_TESTS, "Test").with_base(sciunit));
        registry.register(RuntimeClass::new(MOD_NU_TESTS, "ProtocolToFeaturesTest").with_base(test));
        registry.register(RuntimeClass::new(MOD_NU_TESTS, "VmTest").with_base(protocol));

        let druckmann = d(MOD_NU_DRUCKMANN2013, DRUCKMANN2013_BASE);
        registry.register(
            RuntimeClass::new(MOD_NU_DRUCKMANN2013, DRUCKMANN2013_BASE).with_base(d(MOD_NU_TESTS, "VmTest")),
        );
        for name in DRUCKMANN2013_TESTS {
            registry.register(RuntimeClass::new(MOD_NU_DRUCKMANN2013, *name).with_base(druckmann.clone()));
        }

        FamilyRoots {
            model_root: model,
            capability_root: capability,
        }
    }

    /// Fresh registry with the standard runtime classes and a catalog over it.
    pub fn catalog(namespaces: NamespaceManager) -> Catalog {
        let registry = RuntimeRegistry::new();
        let roots = Self::register_runtime(&registry);
        Catalog::new(Arc::new(registry), roots).with_namespaces(namespaces)
    }

    /// Create the two schema contexts and define their catalog classes,
    /// including mirrors of the neuronunit test classes.
    pub fn install(catalog: &Catalog) -> SchemaResult<Self> {
        let su = catalog.new_context(BASE_SCHEMA_URL)?;
        let nu = catalog.new_context(BASE_NU_SCHEMA_URL)?;
        catalog.import_from(nu, su)?;

        let su_ns = BASE_SCHEMA_NS;
        let nu_ns = BASE_NU_SCHEMA_NS;
        let id = |ns: &str, name: &str| ident_type(ns, name);

        catalog.define_class(
            su,
            ClassDef::plain(su_ns, "SciUnit").runtime(ClassDescriptor::new(MOD_BASE, "SciUnit")),
        )?;
        catalog.define_class(
            su,
            ClassDef::plain(su_ns, "Capability")
                .runtime(ClassDescriptor::new(MOD_CAPABILITIES, "Capability"))
                .parent(id(su_ns, "SciUnit")),
        )?;
        catalog.define_class(
            su,
            ClassDef::plain(su_ns, "RunnableCapability")
                .runtime(ClassDescriptor::new(MOD_CAPABILITIES, "Runnable"))
                .parent(id(su_ns, "Capability")),
        )?;
        catalog.define_class(
            su,
            ClassDef::model(su_ns, "Model")
                .runtime(ClassDescriptor::new(MOD_MODELS, "Model"))
                .parent(id(su_ns, "SciUnit"))
                .family(ModelFamily::Base),
        )?;
        catalog.define_class(su, ClassDef::plain(su_ns, "RunnableModelAttribute"))?;
        catalog.define_class(
            su,
            ClassDef::model(su_ns, "RunnableModel")
                .runtime(ClassDescriptor::new(MOD_RUNNABLE, "RunnableModel"))
                .parent(id(su_ns, "Model"))
                .family(ModelFamily::Runnable),
        )?;
        catalog.define_class(
            su,
            ClassDef::test(su_ns, "Test")
                .runtime(ClassDescriptor::new(MOD_TESTS, "Test"))
                .parent(id(su_ns, "SciUnit")),
        )?;

        catalog.define_class(
            nu,
            ClassDef::model(nu_ns, "LEMSModel")
                .runtime(ClassDescriptor::new(MOD_NU_LEMS, "LEMSModel"))
                .parent(id(su_ns, "RunnableModel"))
                .family(ModelFamily::file_backed([LEMS_LOCATOR])),
        )?;
        catalog.define_class(
            nu,
            ClassDef::model(nu_ns, "ChannelModel")
                .runtime(ClassDescriptor::new(MOD_NU_CHANNEL, "ChannelModel"))
                .parent(id(nu_ns, "LEMSModel")),
        )?;
        catalog.define_class(
            nu,
            ClassDef::model(nu_ns, "ReducedModel")
                .runtime(ClassDescriptor::new(MOD_NU_REDUCED, "ReducedModel"))
                .parent(id(nu_ns, "LEMSModel")),
        )?;
        Self::mirror_tests(catalog, nu)?;

        Ok(Self {
            sciunit: su,
            neuronunit: nu,
        })
    }

    /// Mirror the neuronunit test hierarchy into `ctx` under the neuronunit
    /// schema namespace: the protocol tests, then the Druckmann2013 family.
    pub fn mirror_tests(catalog: &Catalog, ctx: ContextId) -> SchemaResult<MirroredClasses> {
        let registry = catalog.registry();
        let handle = |module: &str, name: &str| registry.resolve(&ClassDescriptor::new(module, name));

        let mut runtimes: Vec<ClassHandle> = vec![
            handle(MOD_NU_TESTS, "ProtocolToFeaturesTest")?,
            handle(MOD_NU_TESTS, "VmTest")?,
            handle(MOD_NU_DRUCKMANN2013, DRUCKMANN2013_BASE)?,
        ];
        for name in DRUCKMANN2013_TESTS {
            runtimes.push(handle(MOD_NU_DRUCKMANN2013, *name)?);
        }
        ClassFactory::new(ctx, BASE_NU_SCHEMA_NS).create_classes(catalog, &runtimes)
    }
}
