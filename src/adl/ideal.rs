// This module lists the names every architecture description can rely on without declaring
// them: the machine-leaf operand types of the ideal graph, the ideal constant and boolean
// node types, the ideal instruction opcodes, and a handful of special operands (the Universe
// result of control instructions, branch labels, stack-slot registers, call targets). The
// model registers all of them as ideal-only forms before the first line is parsed. The
// effect names and the opcode set eligible for commutative-operand cloning live here too.

//! Built-in type names of the ideal graph.

/// Machine-leaf operand types; `Set` heads every assignment.
pub const IDEAL_OPERANDS: &[&str] = &[
    "Set",
    "RegN",
    "RegI",
    "RegP",
    "RegF",
    "RegD",
    "RegL",
    "VecA",
    "VecS",
    "VecD",
    "VecX",
    "VecY",
    "VecZ",
    "RegVectMask",
    "RegFlags",
];

/// Ideal nodes that behave as operands rather than instructions.
pub const IDEAL_CONSTANTS: &[&str] = &[
    "ConI",
    "ConP",
    "ConN",
    "ConNKlass",
    "ConF",
    "ConD",
    "ConL",
    "Con",
    "Bool",
];

/// User-visible operands with no match rule. The `sReg` family is
/// constrained to the spill class.
pub const SPECIAL_OPERANDS: &[(&str, Option<&str>)] = &[
    ("Universe", None),
    ("label", None),
    ("sRegI", Some("stack_slots")),
    ("sRegP", Some("stack_slots")),
    ("sRegF", Some("stack_slots")),
    ("sRegD", Some("stack_slots")),
    ("sRegL", Some("stack_slots")),
    ("method", None),
];

/// Ideal instruction opcodes. Constants from [`IDEAL_CONSTANTS`] are
/// interleaved where the ideal graph declares them.
pub const IDEAL_OPCODES: &[&str] = &[
    "AbsD", "AbsF", "AbsI", "AbsL",
    "AddD", "AddF", "AddI", "AddL", "AddP",
    "Allocate", "AllocateArray",
    "AndI", "AndL",
    "AryEq", "StrComp", "StrEquals", "StrIndexOf", "StrIndexOfChar",
    "StrCompressedCopy", "StrInflatedCopy", "HasNegatives", "EncodeISOArray",
    "AtanD", "Binary", "Blackhole",
    "Bool", "BoxLock",
    "ReverseBytesI", "ReverseBytesL", "ReverseBytesUS", "ReverseBytesS",
    "CProj", "CacheWB", "CacheWBPreSync", "CacheWBPostSync",
    "CallDynamicJava", "CallJava", "CallLeaf", "CallLeafNoFP", "CallLeafVector",
    "CallRuntime", "CallNative", "CallStaticJava",
    "CastDD", "CastFF", "CastII", "CastLL", "CastVV", "CastX2P", "CastP2X", "CastPP",
    "Catch", "CatchProj", "CheckCastPP", "ClearArray",
    "ConstraintCast", "CMoveD", "CMoveVD", "CMoveF", "CMoveVF", "CMoveI", "CMoveL",
    "CMoveP", "CMoveN",
    "CmpN", "CmpD", "CmpD3", "CmpF", "CmpF3", "CmpI", "CmpL", "CmpL3", "CmpLTMask",
    "CmpP", "CmpU", "CmpUL",
    "CompareAndSwapB", "CompareAndSwapS", "CompareAndSwapI", "CompareAndSwapL",
    "CompareAndSwapP", "CompareAndSwapN",
    "WeakCompareAndSwapB", "WeakCompareAndSwapS", "WeakCompareAndSwapI",
    "WeakCompareAndSwapL", "WeakCompareAndSwapP", "WeakCompareAndSwapN",
    "CompareAndExchangeB", "CompareAndExchangeS", "CompareAndExchangeI",
    "CompareAndExchangeL", "CompareAndExchangeP", "CompareAndExchangeN",
    "GetAndAddB", "GetAndAddS", "GetAndAddI", "GetAndAddL",
    "GetAndSetB", "GetAndSetS", "GetAndSetI", "GetAndSetL", "GetAndSetP", "GetAndSetN",
    "Con", "ConN", "ConNKlass", "ConD", "ConF", "ConI", "ConL", "ConP",
    "Conv2B", "ConvD2F", "ConvD2I", "ConvD2L", "ConvF2D", "ConvF2I", "ConvF2L",
    "ConvI2D", "ConvI2F", "ConvI2L", "ConvL2D", "ConvL2F", "ConvL2I",
    "CountedLoop", "CountedLoopEnd", "OuterStripMinedLoop", "OuterStripMinedLoopEnd",
    "CountLeadingZerosI", "CountLeadingZerosL", "CountTrailingZerosI",
    "CountTrailingZerosL", "CreateEx",
    "DecodeN", "DecodeNKlass", "DivD", "DivF", "DivI", "DivL", "DivMod", "DivModI",
    "DivModL", "EncodeP", "EncodePKlass",
    "ExpD", "FastLock", "FastUnlock", "FmaD", "FmaF",
    "Goto", "Halt", "If", "RangeCheck", "IfFalse", "IfTrue", "Initialize",
    "JumpProj", "Jump", "JProj",
    "LShiftI", "LShiftL",
    "LoadB", "LoadUB", "LoadUS", "LoadD", "LoadD_unaligned", "LoadF", "LoadI",
    "LoadKlass", "LoadNKlass", "LoadL", "LoadL_unaligned", "LoadPLocked", "LoadP",
    "LoadN", "LoadRange", "LoadS",
    "Lock", "Loop", "LoopLimit", "Mach", "MachNullCheck", "MachProj",
    "MulAddS2I", "MaxI", "MaxL", "MaxD", "MaxF", "MemBarAcquire", "LoadFence",
    "SetVectMaskI", "MemBarAcquireLock", "MemBarCPUOrder", "MemBarRelease",
    "StoreFence", "StoreStoreFence", "MemBarReleaseLock", "MemBarVolatile",
    "MemBarStoreStore", "MergeMem", "MinI", "MinL", "MinF", "MinD",
    "ModD", "ModF", "ModI", "ModL", "MoveI2F", "MoveF2I", "MoveL2D", "MoveD2L",
    "MulD", "MulF", "MulHiL", "UMulHiL", "MulI", "MulL", "Multi",
    "NegI", "NegL", "NegD", "NegF", "NeverBranch", "OnSpinWait", "Opaque1",
    "Opaque2", "Opaque3", "Opaque4", "ProfileBoolean",
    "OrI", "OrL", "OverflowI", "OverflowAddI", "OverflowSubI", "OverflowMulI",
    "OverflowL", "OverflowAddL", "OverflowSubL", "OverflowMulL",
    "PCTable", "Parm", "PartialSubtypeCheck", "SubTypeCheck", "Phi",
    "PopCountI", "PopCountL", "PopCountVI", "PrefetchAllocation", "Proj",
    "RShiftI", "RShiftL", "Region", "Rethrow", "Return", "Root",
    "RoundDouble", "RoundDoubleMode", "RoundDoubleModeV", "RotateLeft",
    "RotateLeftV", "RotateRight", "RotateRightV", "RoundFloat",
    "SafePoint", "SafePointScalarObject", "ShenandoahCompareAndExchangeP",
    "ShenandoahCompareAndExchangeN", "ShenandoahCompareAndSwapN",
    "ShenandoahCompareAndSwapP", "ShenandoahWeakCompareAndSwapN",
    "ShenandoahWeakCompareAndSwapP", "ShenandoahIUBarrier", "ShenandoahLoadReferenceBarrier",
    "SCMemProj", "CopySignD", "CopySignF", "SignumD", "SignumF", "SqrtD", "SqrtF",
    "Start", "StartOSR",
    "StoreB", "StoreC", "StoreCM", "StorePConditional", "StoreIConditional",
    "StoreLConditional", "StoreD", "StoreF", "StoreI", "StoreL", "StoreP", "StoreN",
    "StoreNKlass",
    "SubD", "SubF", "SubI", "SubL",
    "TailCall", "TailJump", "MacroLogicV", "ThreadLocal", "Unlock",
    "URShiftB", "URShiftI", "URShiftL", "URShiftS",
    "XorI", "XorL", "Vector", "AddVB", "AddVS", "AddVI", "AddReductionVI",
    "AddVL", "AddReductionVL", "AddVF", "AddReductionVF", "AddVD",
    "AddReductionVD", "SubVB", "SubVS", "SubVI", "SubVL", "SubVF", "SubVD",
    "MulVB", "MulVS", "MulVI", "MulReductionVI", "MulVL", "MulReductionVL",
    "MulVF", "MulReductionVF", "MulVD", "MulReductionVD", "MulAddVS2VI",
    "FmaVD", "FmaVF", "DivVF", "DivVD", "AbsVB", "AbsVS", "AbsVI", "AbsVL",
    "AbsVF", "AbsVD", "NegVI", "NegVF", "NegVD", "SqrtVD", "SqrtVF",
    "LShiftCntV", "RShiftCntV", "LShiftVB", "LShiftVS", "LShiftVI", "LShiftVL",
    "RShiftVB", "RShiftVS", "RShiftVI", "RShiftVL", "URShiftVB", "URShiftVS",
    "URShiftVI", "URShiftVL", "AndV", "AndReductionV", "OrV", "OrReductionV",
    "XorV", "XorReductionV", "MinV", "MaxV", "MinReductionV", "MaxReductionV",
    "LoadVector", "LoadVectorGather", "LoadVectorGatherMasked", "StoreVector",
    "StoreVectorScatter", "StoreVectorScatterMasked", "LoadVectorMasked",
    "StoreVectorMasked", "VectorCmpMasked", "VectorMaskGen", "VectorMaskOp",
    "VectorMaskTrueCount", "VectorMaskFirstTrue", "VectorMaskLastTrue",
    "VectorMaskToLong", "Pack", "PackB", "PackS", "PackI", "PackL", "PackF",
    "PackD", "Pack2L", "Pack2D", "ReplicateB", "ReplicateS", "ReplicateI",
    "ReplicateL", "ReplicateF", "ReplicateD", "Extract",
    "ExtractB", "ExtractUB", "ExtractC", "ExtractS", "ExtractI", "ExtractL",
    "ExtractF", "ExtractD", "Digit", "LowerCase", "UpperCase", "Whitespace",
    "VectorBox", "VectorBoxAllocate", "VectorUnbox", "VectorMaskWrapper",
    "VectorMaskCmp", "VectorMaskCast", "VectorTest", "VectorBlend",
    "VectorRearrange", "VectorLoadMask", "VectorLoadShuffle", "VectorLoadConst",
    "VectorStoreMask", "VectorReinterpret", "VectorCast", "VectorCastB2X",
    "VectorCastS2X", "VectorCastI2X", "VectorCastL2X", "VectorCastF2X",
    "VectorCastD2X", "VectorInsert", "MaskAll", "AndVMask", "OrVMask", "XorVMask",
];

/// Operations whose two subtree operands may be swapped to derive an
/// additional match rule.
pub const COMMUTATIVE_OPS: &[&str] = &[
    "AddI", "AddL", "AddF", "AddD",
    "AddVB", "AddVS", "AddVI", "AddVL", "AddVF", "AddVD",
    "AndI", "AndL",
    "AndV",
    "MaxI", "MinI", "MaxF", "MinF", "MaxD", "MinD",
    "MaxV", "MinV",
    "MulI", "MulL", "MulF", "MulD",
    "MulVB", "MulVS", "MulVI", "MulVL", "MulVF", "MulVD",
    "OrI", "OrL",
    "OrV",
    "XorI", "XorL",
    "XorV",
];

/// Effect names accepted in `effect(...)` lists.
pub const EFFECT_NAMES: &[&str] = &[
    "USE", "DEF", "USE_DEF", "KILL", "USE_KILL", "TEMP", "TEMP_DEF", "CALL",
];

/// Names of the instruction and operand cost attributes.
pub const INS_COST: &str = "ins_cost";
pub const OP_COST: &str = "op_cost";

pub fn is_ideal_operand(name: &str) -> bool {
    IDEAL_OPERANDS.contains(&name) || IDEAL_CONSTANTS.contains(&name)
}

/// True for ideal instructions, excluding the operand-like constants.
pub fn is_ideal_instruction(name: &str) -> bool {
    IDEAL_OPCODES.contains(&name) && !IDEAL_CONSTANTS.contains(&name)
}

/// True for any opcode of the ideal graph past the machine leaves.
pub fn is_ideal_opcode(name: &str) -> bool {
    IDEAL_OPCODES.contains(&name)
}

pub fn is_commutative(op: &str) -> bool {
    COMMUTATIVE_OPS.contains(&op)
}
